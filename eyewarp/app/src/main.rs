use anyhow::Result;
use common::{load_config, WarpConfig};
use eyewarp::{plugins, EyeWarpRenderer, Session, SyntheticCamera, Throughput};
use log::{debug, error, info, trace};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    info!("Starting...");
    debug!("Debug logging is active");
    trace!("Trace logging is active");

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        info!("Received Ctrl-C, shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let config_path = Path::new("eyewarp.json");
    let config = load_config(config_path).unwrap_or_else(|e| {
        error!("Failed to load config: {:#}. Using defaults.", e);
        WarpConfig::default()
    });
    info!("Loaded Config: {:?}", config);

    let detector = match plugins::load_detector(&config.module) {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            error!("{}", e);
            None
        }
    };

    let camera = SyntheticCamera::new(&config.capture);
    let mut session = Session::start(&config, Box::new(camera), detector)?;

    let mut renderer =
        EyeWarpRenderer::new(session.targets(), config.capture.width, config.capture.height);
    renderer.set_strength(session.effective_strength(config.strength()));
    renderer.set_mirror(config.mirror_enabled);
    info!(
        "Rendering at strength {:.2}, mirror {}",
        renderer.strength(),
        renderer.mirror()
    );

    info!("Entering Main Loop (Render)...");

    let mut throughput = Throughput::new("Rendering");
    let mut last_frame_time = Instant::now();
    let target_frame_duration = config.frame_duration();

    while running.load(Ordering::SeqCst) {
        if !session.is_capturing() {
            info!("Capture ended.");
            break;
        }
        let Some(preview) = session.latest_preview() else {
            thread::sleep(Duration::from_millis(5));
            continue;
        };

        renderer.resize(preview.texture.width, preview.texture.height);
        renderer.draw_frame(&preview.texture, &preview.tex_matrix);
        throughput.tick();

        if let Some(target_duration) = target_frame_duration {
            let elapsed = last_frame_time.elapsed();
            if elapsed < target_duration {
                thread::sleep(target_duration - elapsed);
            }
        }
        last_frame_time = Instant::now();
    }

    info!("Shutting down...");
    session.shutdown();
    info!("Rendered {} frames", throughput.frame_count());
    Ok(())
}
