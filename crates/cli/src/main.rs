use clap::error::ErrorKind;
use clap::Parser;
use std::net::IpAddr;
use std::sync::mpsc;
use stubdns_client::{QueryResult, RecordType, ResolverConfig, StubClient};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stubdns")]
#[command(version)]
#[command(about = "Asynchronous DNS stub resolver client")]
struct Cli {
    /// Nameserver IP
    #[arg(short = 's', long = "server", default_value = "127.0.0.1")]
    server: IpAddr,

    /// Nameserver port
    #[arg(short = 'p', long = "port", default_value_t = 53)]
    port: u16,

    /// Number of worker threads (0 = one per core)
    #[arg(short = 'w', long = "workers", default_value_t = 0)]
    workers: usize,

    /// Query timeout in milliseconds
    #[arg(short = 't', long = "timeout", default_value_t = 2000)]
    timeout_ms: u64,

    /// Make AAAA queries rather than A
    #[arg(short = '6', long = "ipv6")]
    ipv6: bool,

    /// Raise log verbosity (use multiple times)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    verbose: u8,

    /// Hostnames to resolve
    #[arg(required = true, value_name = "HOST")]
    hosts: Vec<String>,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.verbose);

    let qtype = if cli.ipv6 {
        RecordType::AAAA
    } else {
        RecordType::A
    };

    let mut config = ResolverConfig::new(cli.server);
    config.port = cli.port;
    config.workers = cli.workers;
    config.timeout_ms = cli.timeout_ms;

    info!(
        server = %config.server_addr(),
        workers = config.effective_workers(),
        timeout_ms = config.timeout_ms,
        qtype = %qtype,
        "starting"
    );

    let mut client = StubClient::new(config);
    client.start()?;

    let (tx, rx) = mpsc::channel();
    for host in &cli.hosts {
        let tx = tx.clone();
        client.query(host, qtype, move |outcome| {
            let _ = tx.send(outcome);
        });
    }

    for _ in 0..cli.hosts.len() {
        let outcome = rx.recv()?;

        println!("{}: {}", outcome.name, outcome.result);
        let rcode = match &outcome.result {
            QueryResult::Success(answer) => answer.rcode,
            QueryResult::Timeout | QueryResult::Error(_) => 0,
        };
        println!("  rcode={}", rcode);

        match outcome.result {
            QueryResult::Success(answer) => {
                for (owner, addr) in &answer.addrs {
                    println!("  {} {} {}", owner, outcome.qtype, addr);
                }
                for (owner, canonical) in &answer.cnames {
                    println!("  {} CNAME {}", owner, canonical);
                }
            }
            QueryResult::Timeout => {}
            QueryResult::Error(e) => {
                println!("  {}", e);
            }
        }
    }

    client.stop();
    Ok(())
}
