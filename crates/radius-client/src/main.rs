use clap::Parser;
use radius_client::{Client, ClientConfig, ConfigError, RequestError};
use radius_proto::{AttributeSet, AttributeType, Code, Packet};
use std::cell::RefCell;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_ACCEPT: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;

/// radclient - send one RADIUS request and report the answer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "radclient")]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// RADIUS server (host[:port] or stream socket path)
    #[arg(short, long)]
    server: Option<String>,

    /// Shared secret
    #[arg(long)]
    secret: Option<String>,

    /// Total timeout in milliseconds
    #[arg(short, long, value_name = "TIMEOUT_MS")]
    timeout: Option<u64>,

    /// Retransmissions per address
    #[arg(short, long)]
    retries: Option<usize>,

    /// Request code name
    #[arg(long, default_value = "Access-Request")]
    code: String,

    /// User-Name to send
    user: String,

    /// User-Password to send
    password: String,
}

fn load_config(cli: &Cli) -> Result<ClientConfig, ConfigError> {
    let mut config = match cli.config {
        Some(ref path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };

    // Command line overrides the file
    if let Some(ref server) = cli.server {
        config.server = server.clone();
    }
    if let Some(ref secret) = cli.secret {
        config.secret = secret.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_ms = timeout;
    }
    if let Some(retries) = cli.retries {
        config.retries = retries;
    }

    config.validate()?;
    Ok(config)
}

fn build_attributes(cli: &Cli, config: &ClientConfig) -> Result<AttributeSet, String> {
    let mut attrs = AttributeSet::new();
    attrs
        .add(AttributeType::UserName.as_u8(), cli.user.as_bytes())
        .map_err(|e| format!("User-Name: {}", e))?;
    attrs
        .add(AttributeType::UserPassword.as_u8(), cli.password.as_bytes())
        .map_err(|e| format!("User-Password: {}", e))?;
    if let Some(ref nas_identifier) = config.nas_identifier {
        attrs
            .add(AttributeType::NasIdentifier.as_u8(), nas_identifier.as_bytes())
            .map_err(|e| format!("NAS-Identifier: {}", e))?;
    }
    Ok(attrs)
}

fn report(response: &Packet) {
    println!("{}", response.code());
    for attr in response.attributes() {
        if attr.attr_type == AttributeType::ReplyMessage.as_u8() {
            println!("  Reply-Message: {}", String::from_utf8_lossy(&attr.value));
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(EXIT_USAGE);
        }
    };

    let log_level = config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(code) = Code::from_name(&cli.code) else {
        eprintln!("Unknown request code: {}", cli.code);
        process::exit(EXIT_USAGE);
    };

    let attrs = match build_attributes(&cli, &config) {
        Ok(attrs) => attrs,
        Err(e) => {
            eprintln!("Invalid attribute {}", e);
            process::exit(EXIT_USAGE);
        }
    };

    let outcome: Rc<RefCell<Option<Result<Packet, RequestError>>>> = Rc::default();
    let slot = Rc::clone(&outcome);

    let mut client = Client::new();
    if let Err(e) = client
        .send(
            code,
            &attrs,
            &config.server,
            config.secret.as_bytes(),
            config.timeout(),
            config.retries,
            move |result| *slot.borrow_mut() = Some(result),
        )
        .await
    {
        error!(server = %config.server, error = %e, "Failed to send request");
        process::exit(EXIT_FAILURE);
    }

    debug!(server = %config.server, code = %code, "Waiting for response");
    client.run_until_idle().await;
    drop(client);

    let result = outcome.borrow_mut().take();
    match result {
        Some(Ok(response)) => {
            report(&response);
            if response.code() == Code::ACCESS_ACCEPT || code != Code::ACCESS_REQUEST {
                process::exit(EXIT_ACCEPT);
            }
            process::exit(EXIT_FAILURE);
        }
        Some(Err(e)) => {
            eprintln!("{}", e);
            process::exit(EXIT_FAILURE);
        }
        None => process::exit(EXIT_FAILURE),
    }
}
