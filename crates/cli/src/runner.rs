// runner.rs
use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, StreamExt};
use std::io::{BufRead, IsTerminal};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader, DuplexStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use buckscan_common::{
    BucketName, CredentialLister, NormalizeOptions, PoolOptions, ProbeOptions,
};
use buckscan_normalizer::{name_stream, resolve_single};
use buckscan_orchestrator::Orchestrator;
use buckscan_prober::{BucketProber, DisabledLister, ReqwestHttp, S3Lister};

use crate::args::Cli;
use crate::output::ResultSink;

/// Bytes buffered between the stdin thread and the name stream.
const STDIN_BUFFER: usize = 64 * 1024;

const USAGE: &str = "no bucket given\n\n\
Usage:\n  Single bucket:    buckscan [-q] <bucket>\n  Multiple buckets: cat domains.txt | buckscan [-q] [-w workers]";

pub async fn run_scan(cli: Cli) -> Result<()> {
    let normalize = NormalizeOptions {
        lowercase: !cli.keep_case,
    };
    let probe_options = probe_options(&cli);
    let pool = PoolOptions::default().with_workers(cli.workers);
    let format = cli.format();

    let names = name_source(cli.bucket.as_deref(), &normalize)?;

    info!("Starting scan...");
    info!("Workers: {}", pool.effective_workers());
    info!("Timeout: {:?}", probe_options.timeout);
    info!("Endpoint: *.{}", probe_options.endpoint_suffix);

    let lister: Arc<dyn CredentialLister> = if cli.no_aws {
        Arc::new(DisabledLister)
    } else {
        Arc::new(
            S3Lister::from_env(
                cli.aws_profile.as_deref(),
                cli.aws_region.as_deref(),
                &probe_options,
            )
            .await,
        )
    };
    let http = Arc::new(
        ReqwestHttp::new(probe_options.timeout).context("Failed to build HTTP client")?,
    );
    let prober = Arc::new(BucketProber::new(lister, http, probe_options));

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let mut handle = Orchestrator::new(prober, pool)
        .with_cancellation(cancel)
        .run(names);

    let mut sink = ResultSink::new(format, std::io::stdout());
    while let Some(verdict) = handle.next().await {
        sink.write_verdict(&verdict)?;
    }
    let stats = handle.finish().await?;
    interrupt.abort();

    sink.write_summary(&stats)?;
    Ok(())
}

fn probe_options(cli: &Cli) -> ProbeOptions {
    ProbeOptions::default()
        .with_timeout(Duration::from_secs(cli.timeout.max(1)))
        .with_endpoint_suffix(cli.endpoint.trim_matches('.'))
        .with_write_probe(!cli.no_write_probe)
}

/// Single argument wins; otherwise stdin when it is piped. Neither is a usage error.
fn name_source(
    arg: Option<&str>,
    opts: &NormalizeOptions,
) -> Result<BoxStream<'static, BucketName>> {
    if let Some(arg) = arg {
        let name = resolve_single(arg, opts)?;
        return Ok(stream::iter(vec![name]).boxed());
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        anyhow::bail!(USAGE);
    }
    let stdin = detached_reader(std::io::BufReader::new(stdin));
    Ok(name_stream(BufReader::new(stdin), *opts))
}

/// Forward a blocking reader through a detached thread.
///
/// A read parked on tokio's stdin cannot be cancelled and holds runtime
/// shutdown until the producer writes or closes (`tail -f domains | buckscan`
/// after Ctrl-C). A plain thread never holds up process exit.
fn detached_reader<R>(mut src: R) -> DuplexStream
where
    R: BufRead + Send + 'static,
{
    let (mut tx, rx) = tokio::io::duplex(STDIN_BUFFER);
    let rt = tokio::runtime::Handle::current();
    std::thread::spawn(move || {
        let mut line = Vec::new();
        loop {
            line.clear();
            match src.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {
                    // fails once the name stream is dropped
                    if rt.block_on(tx.write_all(&line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupted; finishing in-flight probes");
        token.cancel();
    }
}
