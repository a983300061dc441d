mod app;
mod held_keys;
mod network;
mod render;
mod terminal;

use std::fs::File;
use std::rc::Rc;
use std::time::Instant;

use livekeys_audio::{AudioBackend, CpalBackend, NullBackend};
use livekeys_core::{Config, LaneFactory, LiveKeyboard, LocalSession, SessionStatus};
use livekeys_net::random_room_id;

use app::{App, FRAME_INTERVAL};
use terminal::TerminalBackend;

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let log_path = dirs::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("livekeys")
        .join("livekeys.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = File::create(&log_path).unwrap_or_else(|_| {
        File::create("/tmp/livekeys.log").expect("Cannot create log file")
    });

    WriteLogger::init(log_level, simplelog::Config::default(), log_file)
        .expect("Failed to initialize logger");

    log::info!("livekeys starting (log level: {:?})", log_level);
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let config = Config::load();

    if args.iter().any(|a| a == "--server") {
        let listen = arg_value(&args, "--listen");
        return network::run_server(&config, listen.as_deref());
    }

    let connect_addr = arg_value(&args, "--connect");
    let room = arg_value(&args, "--room").unwrap_or_else(random_room_id);
    let name = arg_value(&args, "--name").unwrap_or_else(|| "player".to_string());

    let (channel, status) = match &connect_addr {
        Some(addr) => network::join(addr, &room, &name),
        None => (network::offline(), SessionStatus::Offline),
    };

    let mut backend = TerminalBackend::new()?;
    backend.start()?;

    let result = run(&mut backend, &config, channel, status, connect_addr.map(|_| room));

    backend.stop()?;
    result
}

fn audio_backend() -> Rc<dyn AudioBackend> {
    match CpalBackend::new() {
        Ok(backend) => {
            log::info!("Audio output at {} Hz", backend.sample_rate());
            Rc::new(backend)
        }
        Err(e) => {
            log::warn!("No audio output ({}); playing silently", e);
            Rc::new(NullBackend::new())
        }
    }
}

fn run(
    terminal: &mut TerminalBackend,
    config: &Config,
    channel: Box<dyn livekeys_core::PresenceChannel>,
    status: SessionStatus,
    room: Option<String>,
) -> std::io::Result<()> {
    let px_per_column = config.px_per_column();
    let (columns, _) = terminal.size()?;

    let lanes = LaneFactory::new(
        audio_backend(),
        config.sample_host().source(),
        config.loader_settings(),
    );
    let session = LocalSession::start(channel, &config.default_instrument());
    let mut keyboard = LiveKeyboard::new(
        session,
        lanes,
        config.key_range_settings(),
        config.keyboard_layout(),
        columns as u32 * px_per_column,
    );
    keyboard.set_status(status);

    let mut app =
        App::new(keyboard, px_per_column, terminal.reports_key_release()).with_room(room);

    let mut last_render = Instant::now() - FRAME_INTERVAL;
    let mut needs_render = true;

    while !app.should_quit() {
        if let Some(event) = terminal.poll_event(FRAME_INTERVAL / 2) {
            app.handle_event(event, Instant::now());
        }

        let now = Instant::now();
        needs_render |= app.tick(now);

        if needs_render && now.duration_since(last_render) >= FRAME_INTERVAL {
            let frame = app.keyboard().frame();
            let map = app.cell_map(&frame);
            let chrome = app.chrome();
            terminal.draw(|area, buf| {
                render::draw(buf, area, &frame, map, &chrome, |x, y| app.key_at(x, y));
            })?;
            last_render = now;
            needs_render = false;
        }
    }

    log::info!("livekeys shutting down");
    app.shutdown();
    Ok(())
}
