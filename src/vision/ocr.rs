//! OCR (Optical Character Recognition) module
//!
//! OCR itself runs outside this crate. An [`OcrEngine`] hands back the raw
//! detections for one image, either from an external program or from a
//! precomputed sidecar file.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{OcrBackend, RawDetection};
use crate::command::{CollaboratorError, CommandSpec};
use crate::config::OcrSettings;

/// Source of raw detections for an image
pub trait OcrEngine: Send + Sync {
    /// Run OCR on the image at `path`
    fn read(&self, path: &Path) -> Result<Vec<RawDetection>, CollaboratorError>;
}

impl<E: OcrEngine + ?Sized> OcrEngine for Box<E> {
    fn read(&self, path: &Path) -> Result<Vec<RawDetection>, CollaboratorError> {
        (**self).read(path)
    }
}

/// OCR engine backed by an external program.
///
/// Invoked as `<program> <args...> --lang <codes> <image>` where `<codes>` is
/// the comma-separated OCR language set; the program must print a JSON array
/// of detections on stdout.
pub struct CommandOcr {
    command: CommandSpec,
}

impl CommandOcr {
    pub fn new<S: AsRef<str>>(mut command: CommandSpec, languages: &[S]) -> Self {
        let codes: Vec<&str> = languages.iter().map(|l| l.as_ref()).collect();
        command.args.push("--lang".to_string());
        command.args.push(codes.join(","));
        Self { command }
    }
}

impl OcrEngine for CommandOcr {
    fn read(&self, path: &Path) -> Result<Vec<RawDetection>, CollaboratorError> {
        self.command.run_with_path(path)
    }
}

/// OCR engine replaying precomputed results stored as `<stem>.ocr.json`
#[derive(Debug, Default)]
pub struct SidecarOcr;

impl SidecarOcr {
    /// Location of the sidecar file for an image
    pub fn sidecar_path(image: &Path) -> PathBuf {
        image.with_extension("ocr.json")
    }
}

impl OcrEngine for SidecarOcr {
    fn read(&self, path: &Path) -> Result<Vec<RawDetection>, CollaboratorError> {
        let sidecar = Self::sidecar_path(path);
        debug!("Reading OCR sidecar {:?}", sidecar);

        let content = std::fs::read_to_string(&sidecar).map_err(|source| CollaboratorError::Read {
            path: sidecar.display().to_string(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| CollaboratorError::Parse {
            program: sidecar.display().to_string(),
            source,
        })
    }
}

/// Wrapper that lets only one thread at a time into a non-reentrant engine
pub struct Serialized<E> {
    inner: Mutex<E>,
}

impl<E> Serialized<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }
}

impl<E: OcrEngine> OcrEngine for Serialized<E> {
    fn read(&self, path: &Path) -> Result<Vec<RawDetection>, CollaboratorError> {
        self.inner.lock().read(path)
    }
}

/// Build the configured OCR engine
pub fn build_engine(settings: &OcrSettings) -> Result<Box<dyn OcrEngine>> {
    let engine: Box<dyn OcrEngine> = match settings.backend {
        OcrBackend::Command => {
            let command = settings
                .command
                .clone()
                .context("OCR backend `command` requires [ocr.command] in the configuration")?;
            let engine = CommandOcr::new(command, &settings.languages);
            info!(
                "Using OCR command: {} {:?}",
                engine.command.program, engine.command.args
            );
            Box::new(engine)
        }
        OcrBackend::Sidecar => {
            info!("Using OCR sidecar files (<image>.ocr.json)");
            Box::new(SidecarOcr)
        }
    };

    if settings.serialize {
        info!("Serializing OCR calls across workers");
        return Ok(Box::new(Serialized::new(engine)));
    }

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            SidecarOcr::sidecar_path(Path::new("/data/scan.jpg")),
            PathBuf::from("/data/scan.ocr.json")
        );
    }

    #[test]
    fn test_sidecar_reads_detections() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("page.jpg");
        std::fs::write(
            SidecarOcr::sidecar_path(&image),
            r#"[[[[0, 0], [50, 0], [50, 20], [0, 20]], "Hello", 0.9]]"#,
        )
        .unwrap();

        let detections = SidecarOcr.read(&image).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].text(), "Hello");
    }

    #[test]
    fn test_sidecar_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = SidecarOcr.read(&dir.path().join("missing.jpg"));
        assert!(matches!(result, Err(CollaboratorError::Read { .. })));
    }

    #[test]
    fn test_sidecar_malformed_file() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("page.jpg");
        std::fs::write(SidecarOcr::sidecar_path(&image), "{ not json").unwrap();

        let result = SidecarOcr.read(&image);
        assert!(matches!(result, Err(CollaboratorError::Parse { .. })));
    }

    struct CountingEngine {
        calls: AtomicUsize,
    }

    impl OcrEngine for CountingEngine {
        fn read(&self, _path: &Path) -> Result<Vec<RawDetection>, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[test]
    fn test_serialized_delegates() {
        let engine = Serialized::new(CountingEngine {
            calls: AtomicUsize::new(0),
        });
        engine.read(Path::new("a.jpg")).unwrap();
        engine.read(Path::new("b.jpg")).unwrap();
        assert_eq!(engine.inner.lock().calls.load(Ordering::SeqCst), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_receives_languages_and_path() {
        let dir = TempDir::new().unwrap();
        let argv_file = dir.path().join("argv.txt");
        let script = format!(
            r#"printf '%s\n' "$@" > '{}'; echo '[]'"#,
            argv_file.display()
        );
        let settings = OcrSettings {
            languages: vec!["ar".to_string(), "en".to_string()],
            command: Some(CommandSpec::new("sh", &["-c", script.as_str(), "ocr"])),
            ..OcrSettings::default()
        };

        let engine = build_engine(&settings).unwrap();
        let image = dir.path().join("x.jpg");
        assert!(engine.read(&image).unwrap().is_empty());

        let argv = std::fs::read_to_string(argv_file).unwrap();
        assert_eq!(argv, format!("--lang\nar,en\n{}\n", image.display()));
    }

    #[test]
    fn test_command_backend_requires_command() {
        let settings = OcrSettings::default();
        assert!(build_engine(&settings).is_err());

        let settings = OcrSettings {
            backend: OcrBackend::Sidecar,
            ..OcrSettings::default()
        };
        assert!(build_engine(&settings).is_ok());
    }
}
