use clap::Parser;
use client::input::{spawn_keyboard_reader, RawModeGuard};
use client::local::LocalGame;
use client::network::Client;
use client::status::StatusLine;
use log::{error, info, warn};
use server::display::{FlaschenTaschenSink, NullSink, RenderSink};
use server::network::Server;
use shared::{GameConfig, Geometry, Interrupt, Mode, StopReason, DELAY_MS, LIVENESS_SECS, Z_LAYER};
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Multiplayer snake on a Flaschen-Taschen LED display
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// What to run: local, client or server
    mode: Mode,

    /// Playfield size and display offset as WxH[+X+Y]
    #[arg(short = 'g', long, default_value = "45x40+0+0")]
    geometry: Geometry,

    /// Display z-layer (0-15)
    #[arg(short = 'l', long, default_value_t = Z_LAYER)]
    layer: u8,

    /// Stop after this many seconds
    #[arg(short = 't', long)]
    timeout: Option<f64>,

    /// Display hostname (-h is help)
    #[arg(short = 'H', long, env = "FT_DISPLAY", default_value = "localhost")]
    host: String,

    /// Milliseconds between ticks
    #[arg(short = 'd', long, default_value_t = DELAY_MS)]
    delay: u64,

    /// Address the server listens on
    #[arg(long, default_value = "0.0.0.0:4444")]
    listen: String,

    /// Server address a client joins
    #[arg(long, default_value = "127.0.0.1:4444")]
    connect: String,

    /// Seconds of silence before a session is dropped
    #[arg(long, default_value_t = LIVENESS_SECS)]
    liveness: u64,

    /// RNG seed for food and spawn placement
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn to_config(&self) -> Result<GameConfig, shared::ConfigError> {
        let mut config = GameConfig {
            geometry: self.geometry,
            liveness: Duration::from_secs(self.liveness),
            seed: self.seed.unwrap_or_else(clock_seed),
            ..GameConfig::default()
        }
        .with_layer(self.layer)?
        .with_delay_ms(self.delay)?;

        if let Some(secs) = self.timeout {
            config = config.with_timeout_secs(secs)?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let interrupt = Interrupt::new();
    install_signal_handlers(&interrupt);

    match run(&args, config, interrupt).await {
        Ok(reason) => {
            info!("Stopped: {:?}", reason);
            ExitCode::from(reason.exit_code())
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Raises the interrupt on Ctrl+C, and on SIGTERM where there is one.
fn install_signal_handlers(interrupt: &Interrupt) {
    let on_ctrl_c = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
            on_ctrl_c.raise();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let on_term = interrupt.clone();
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::spawn(async move {
                    if term.recv().await.is_some() {
                        info!("Received SIGTERM, shutting down");
                        on_term.raise();
                    }
                });
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }
}

fn open_display(args: &Args) -> Box<dyn RenderSink + Send> {
    match FlaschenTaschenSink::connect(&args.host, args.geometry.x_offset, args.geometry.y_offset) {
        Ok(sink) => Box::new(sink),
        Err(e) => {
            warn!("Display {} unavailable, not drawing: {}", args.host, e);
            Box::new(NullSink)
        }
    }
}

async fn run(
    args: &Args,
    config: GameConfig,
    interrupt: Interrupt,
) -> Result<StopReason, Box<dyn std::error::Error>> {
    let capabilities = args.mode.capabilities();
    info!("Starting {} mode: {:?}", args.mode, capabilities);

    let display: Box<dyn RenderSink + Send> = if capabilities.owns_display {
        open_display(args)
    } else {
        Box::new(NullSink)
    };

    match args.mode {
        Mode::Server => {
            let mut server = Server::bind(&args.listen, config, display).await?;
            server.run(interrupt).await
        }
        Mode::Local => {
            let mut game = LocalGame::new(config, display)?;
            println!("Controls: W/A/S/D to steer, 0 to quit");

            let _raw = RawModeGuard::enable()?;
            let (inputs, reader) = spawn_keyboard_reader(interrupt.clone());
            let mut status = StatusLine::new(std::io::stdout());
            let outcome = game.run(inputs, interrupt, &mut status).await;
            if let Err(e) = reader.await {
                warn!("Keyboard reader stopped abnormally: {}", e);
            }
            Ok(outcome?.reason)
        }
        Mode::Client => {
            let mut client = Client::connect(&args.connect, config).await?;
            println!("Controls: W/A/S/D to steer, 0 to quit");

            let _raw = RawModeGuard::enable()?;
            let (inputs, reader) = spawn_keyboard_reader(interrupt.clone());
            let mut status = StatusLine::new(std::io::stdout());
            let outcome = client.run(inputs, interrupt, &mut status).await;
            if let Err(e) = reader.await {
                warn!("Keyboard reader stopped abnormally: {}", e);
            }
            Ok(outcome?.reason)
        }
    }
}
