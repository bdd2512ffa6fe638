use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, trace};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use quill::cli::Args;
use quill::config::{self, PathConfig, Settings};
use quill::core::editor_events::{Announcement, FileLoaded, RenderRequested};
use quill::core::{EventBus, EventSink, Workers, downcast_event};
use quill::editor::EditorState;
use quill::fields::EditorForm;
use quill::remote::{FixtureRemote, PooledRemote};

fn main() -> Result<()> {
    let args = Args::parse();

    // Create path configuration from CLI args and environment
    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {:#}", e);
    }

    init_logger(&args, &path_config)?;
    info!("quill starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = config::config_file(config::SETTINGS_FILE, &path_config);
    info!("Config path: {}", settings_path.display());
    let settings = Settings::load(&settings_path)?;
    let timeout = settings.poll_timeout();

    let workers = Workers::from_override(args.workers.unwrap_or(settings.workers_override))?;
    info!("Remote workers: {}", workers.threads());
    let source = Arc::new(FixtureRemote::from_path(&args.site)?);
    let remote = Rc::new(PooledRemote::new(source, Arc::new(workers)));

    let bus = EventBus::new();
    bus.subscribe::<Announcement, _>(|a| {
        match &a.0.description {
            Some(description) => eprintln!("error: {} ({})", a.0, description),
            None => eprintln!("error: {}", a.0),
        }
    });

    let mut state = EditorState::new(remote, EventSink::from_bus(&bus));
    let mut form = EditorForm::new(EventSink::from_bus(&bus));

    // Workspace first: a switch refetches the listing by itself
    if let Some(name) = &args.workspace {
        state.switch_workspace(name, None);
        run_until_idle(&mut state, &mut form, &bus, timeout);
    }
    state.get_project(None);
    state.get_workspace(None);
    state.get_files(None);
    state.get_devices(None);
    run_until_idle(&mut state, &mut form, &bus, timeout);

    print_site(&state, settings.preview_device.as_deref());

    let Some(path) = &args.open else {
        return Ok(());
    };
    state.load_file(path, None);
    run_until_idle(&mut state, &mut form, &bus, timeout);
    if state.file().is_none() {
        anyhow::bail!("Could not open {}", path);
    }
    print_file(&state, &form);

    if let Some(field) = &args.duplicate {
        let list = form
            .list_mut(field)
            .with_context(|| format!("{} has no list field {:?}", path, field))?;
        let token = list.handle_duplicate_item(0)?;
        info!("Duplicated first item of {} ({})", field, token);
        println!("\n{}: {} item(s), clean: {}", field, list.len(), list.is_clean());

        form.commit(&mut state, false)?;
        run_until_idle(&mut state, &mut form, &bus, timeout);
        print_file(&state, &form);
    }

    Ok(())
}

/// Pump settlements and route bus events until nothing is in flight.
fn run_until_idle(state: &mut EditorState, form: &mut EditorForm, bus: &EventBus, timeout: Duration) {
    loop {
        route_events(state, form, bus);
        if state.is_idle() {
            break;
        }
        if state.pump_timeout(timeout) == 0 {
            debug!("Waiting on remote: {:?}", state);
        }
    }
    route_events(state, form, bus);
}

fn route_events(state: &EditorState, form: &mut EditorForm, bus: &EventBus) {
    let mut renders = 0;
    for event in bus.poll() {
        if downcast_event::<RenderRequested>(&event).is_some() {
            renders += 1;
            continue;
        }
        if downcast_event::<FileLoaded>(&event).is_some() {
            if let Some(file) = state.file() {
                form.add_detected(file);
            }
        }
        form.handle_event(&event, state);
    }
    if renders > 0 {
        trace!("{} render request(s)", renders);
    }
}

fn print_site(state: &EditorState, preferred_device: Option<&str>) {
    if let Some(project) = state.project() {
        println!("Project: {} ({})", project.name, project.id);
    }
    if let Some(workspace) = state.workspace() {
        println!("Workspace: {} [{}]", workspace.name, workspace.branch);
    }
    let device = state.devices().and_then(|devices| match preferred_device {
        Some(id) => devices.iter().find(|d| d.id == id),
        None => devices.first(),
    });
    if let Some(device) = device {
        println!("Preview device: {} ({}x{})", device.name, device.width, device.height);
    }
    if let Some(files) = state.files() {
        println!("Files ({}):", files.len());
        for entry in files {
            let collection = entry.collection.as_deref().unwrap_or("-");
            let size = entry.size.map(|s| s.to_string()).unwrap_or_default();
            println!("  {:<40} {:<12} {}", entry.path, collection, size);
        }
    }
}

fn print_file(state: &EditorState, form: &EditorForm) {
    let Some(file) = state.file() else {
        return;
    };
    println!("\nFile: {}", file.path);
    match &file.preview_url {
        Some(url) => println!("Preview: {}", url),
        None => println!("Preview: (none)"),
    }
    for (name, list) in form.lists() {
        println!(
            "  {}: {} item(s), clean: {}, valid: {}, locked: {}",
            name,
            list.len(),
            list.is_clean(),
            list.is_valid(),
            list.is_locked()
        );
    }
}

fn init_logger(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| config::data_file(config::LOG_FILE, path_config));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}
