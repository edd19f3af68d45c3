use clap::{Args, Parser, Subcommand};
use consult_relay::errors::ErrorResult;
use consult_relay::managers::harness::{EndpointHarness, InvocationRequest};
use consult_relay::relay::server::{endpoint_list, run_stdio, SERVER_NAME};
use consult_relay::services::config::HarnessConfig;
use consult_relay::services::logger::Logger;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(name = "consult-relay", version, about = "Endpoint test harness for the consultation API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve line-delimited JSON-RPC on stdin/stdout (default).
    Serve,
    /// List registered endpoints.
    List,
    /// Compose the request for an endpoint without sending it.
    Describe(CallArgs),
    /// Send one test request and print the normalized outcome.
    Test {
        #[command(flatten)]
        call: CallArgs,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct CallArgs {
    endpoint: String,
    /// Parameter as name=value; repeatable.
    #[arg(short = 'p', long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
    /// Connection index.
    #[arg(short = 'c', long = "connection")]
    connection: Option<usize>,
}

impl CallArgs {
    fn into_request(self) -> InvocationRequest {
        let mut request = InvocationRequest::new(self.endpoint);
        for (name, value) in self.params {
            request = request.param(name, value);
        }
        request.connection_index = self.connection;
        request
    }
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}

async fn run(command: Commands) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let logger = Logger::new(SERVER_NAME);
    match command {
        Commands::Serve => {
            run_stdio().await?;
            Ok(true)
        }
        Commands::List => {
            print_json(&endpoint_list());
            Ok(true)
        }
        Commands::Describe(call) => {
            let config = HarnessConfig::from_env()?;
            let harness = EndpointHarness::from_config(logger, &config)?;
            match harness.describe(&call.into_request()) {
                Ok(spec) => {
                    print_json(&spec.redacted());
                    Ok(true)
                }
                Err(err) => {
                    print_json(&serde_json::to_value(ErrorResult::from(err))?);
                    Ok(false)
                }
            }
        }
        Commands::Test { call, timeout_ms } => {
            let mut config = HarnessConfig::from_env()?;
            if let Some(timeout_ms) = timeout_ms {
                config.timeout_ms = timeout_ms;
            }
            let harness = EndpointHarness::from_config(logger, &config)?;
            let report = harness.test(&call.into_request()).await;
            print_json(&report.outcome.to_result());
            Ok(report.outcome.is_ok())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Commands::Serve)).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(2),
        Err(err) => {
            eprintln!("consult-relay: {}", err);
            std::process::exit(1);
        }
    }
}
