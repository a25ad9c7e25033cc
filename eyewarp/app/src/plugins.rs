//! Loading detector modules from shared libraries.

use anyhow::Result;
use api::{
    DetectorAdapter, LandmarkDetector, LandmarkSet, LogLevel, ModuleLogger, RgbaImage,
};
use common::{ModuleConfig, PipelineError};
use libloading::{Library, Symbol};
use log::{debug, error, info, trace, warn};
use std::fs;
use std::path::{Path, PathBuf};

type CreateModule = unsafe extern "C" fn() -> *mut dyn LandmarkDetector;

extern "C" fn module_log_callback(
    level: LogLevel,
    target: *const i8,
    message: *const i8,
) {
    if target.is_null() || message.is_null() {
        return;
    }
    unsafe {
        let target_str = std::ffi::CStr::from_ptr(target)
            .to_str()
            .unwrap_or("unknown");
        let message_str = std::ffi::CStr::from_ptr(message).to_str().unwrap_or("");

        match level {
            LogLevel::Error => error!(target: target_str, "{}", message_str),
            LogLevel::Warn => warn!(target: target_str, "{}", message_str),
            LogLevel::Info => info!(target: target_str, "{}", message_str),
            LogLevel::Debug => debug!(target: target_str, "{}", message_str),
            LogLevel::Trace => trace!(target: target_str, "{}", message_str),
        }
    }
}

/// A detector created by a shared library. Keeps the library mapped until the
/// detector itself is gone.
struct LibraryDetector {
    detector: Box<dyn LandmarkDetector>,
    _library: Library,
}

impl LandmarkDetector for LibraryDetector {
    fn initialize(&mut self, logger: ModuleLogger) -> Result<()> {
        self.detector.initialize(logger)
    }

    fn detect(&mut self, image: &RgbaImage, timestamp_ms: i64) -> Result<Option<LandmarkSet>> {
        self.detector.detect(image, timestamp_ms)
    }

    fn release(&mut self) {
        self.detector.release();
    }
}

/// Module name for a library file: the file stem without the platform's `lib` prefix.
pub fn module_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let name = if cfg!(windows) {
        stem
    } else {
        stem.strip_prefix("lib").unwrap_or(stem)
    };
    Some(name.to_string())
}

fn is_library(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "dll" || ext == "so" || ext == "dylib")
}

/// `directory`, or the same path one level up when running from a build folder.
fn resolve_directory(directory: &str) -> Option<PathBuf> {
    let dir = Path::new(directory);
    if dir.is_dir() {
        return Some(dir.to_path_buf());
    }
    let parent = Path::new("..").join(dir);
    parent.is_dir().then_some(parent)
}

/// Lists `(name, path)` for every library in `directory`.
pub fn discover(directory: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if !is_library(&path) {
            continue;
        }
        if let Some(name) = module_name(&path) {
            found.push((name, path));
        }
    }
    found.sort();
    Ok(found)
}

fn open_library(path: &Path) -> Result<Box<dyn LandmarkDetector>> {
    unsafe {
        let library = Library::new(path)?;
        let raw = {
            let create: Symbol<CreateModule> = library.get(b"create_module")?;
            create()
        };
        anyhow::ensure!(!raw.is_null(), "create_module returned null");
        let detector = Box::from_raw(raw);
        Ok(Box::new(LibraryDetector {
            detector,
            _library: library,
        }))
    }
}

/// Initializes `detector` with a logger routed to `eyewarp::modules::<name>`
/// and wraps it in the fail-closed adapter.
pub fn attach(
    name: &str,
    detector: Box<dyn LandmarkDetector>,
) -> Result<DetectorAdapter, PipelineError> {
    let mut adapter = DetectorAdapter::new(name, detector);
    let logger = ModuleLogger::new(module_log_callback, format!("eyewarp::modules::{}", name));
    match adapter.initialize(logger) {
        Ok(()) => {
            info!("✓ Initialized module: {}", name);
            Ok(adapter)
        }
        Err(e) => {
            adapter.release();
            Err(PipelineError::DetectionUnavailable(format!(
                "failed to initialize '{}': {}",
                name, e
            )))
        }
    }
}

/// Finds, loads and initializes the configured detector module.
pub fn load_detector(config: &ModuleConfig) -> Result<DetectorAdapter, PipelineError> {
    let Some(directory) = resolve_directory(&config.directory) else {
        return Err(PipelineError::DetectionUnavailable(format!(
            "module directory '{}' not found",
            config.directory
        )));
    };

    let candidates = discover(&directory).map_err(|e| {
        PipelineError::DetectionUnavailable(format!("cannot read {:?}: {}", directory, e))
    })?;
    for (name, path) in &candidates {
        debug!("Found module '{}' at {:?}", name, path);
    }

    let Some((name, path)) = candidates.into_iter().find(|(name, _)| *name == config.active)
    else {
        return Err(PipelineError::DetectionUnavailable(format!(
            "active module '{}' not found in {:?}",
            config.active, directory
        )));
    };

    info!("Loading module: {:?}", path);
    let detector = open_library(&path).map_err(|e| {
        error!("✗ Failed to load module {:?}: {}", path, e);
        PipelineError::DetectionUnavailable(format!("failed to load '{}': {}", name, e))
    })?;
    info!("✓ Successfully loaded module: {}", name);

    attach(&name, detector)
}
