//! Structured events emitted while converting.
//!
//! The components never log on their own. They report [`Event`]s to an [`Observer`] that
//! is passed in by the caller. [`LogObserver`] forwards the events to the `log` facade and a
//! [`Sender<Event>`] can be used to capture them, e.g. in tests.

use std::path::PathBuf;

use objglb_shared::{
    crossbeam_channel::Sender,
    log::{debug, error, info, warn},
};

use crate::material_table::TextureSlot;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    MaterialFileMissing(PathBuf),
    MaterialFileUnreadable { path: PathBuf, message: String },
    MaterialsParsed { path: PathBuf, count: usize },
    DefaultMaterialUsed,
    TextureCandidateFailed { candidate: PathBuf, message: String },
    TextureLoaded { material: String, slot: TextureSlot, path: PathBuf },
    TextureNotFound { reference: String },
    MeshesLoaded { path: PathBuf, group_count: usize },
    ExistingMaterialKept { group: String, material: String },
    DefaultMaterialAssigned { group: String },
    ConversionStarted { input: PathBuf },
    ConversionSucceeded { output: PathBuf, file_size: u64 },
    ConversionFailed { input: PathBuf, message: String },
    ThumbnailWritten { path: PathBuf },
    ThumbnailFailed { path: PathBuf, message: String },
    PreviewWritten { path: PathBuf },
    PreviewFailed { path: PathBuf, message: String },
    BatchStarted { file_count: usize },
    BatchFinished { succeeded: usize, failed: usize },
}

pub trait Observer: Send + Sync {
    /// Called for every [`Event`] that happens during a conversion.
    fn notify(&self, event: Event);
}

/// Forwards every [`Event`] to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, event: Event) {
        match event {
            Event::MaterialFileMissing(path) => warn!("MTL file not found: {}", path.display()),
            Event::MaterialFileUnreadable { path, message } => error!("Error parsing MTL file {}: {message}", path.display()),
            Event::MaterialsParsed { path, count } => info!("Parsed {count} materials from {}", path.display()),
            Event::DefaultMaterialUsed => info!("No materials found, using default material"),
            Event::TextureCandidateFailed { candidate, message } => {
                debug!("Failed to load texture from {}: {message}", candidate.display())
            }
            Event::TextureLoaded { material, slot, path } => {
                info!("Loaded {slot} texture for material '{material}' from {}", path.display())
            }
            Event::TextureNotFound { reference } => warn!("Texture not found: {reference}"),
            Event::MeshesLoaded { path, group_count } => debug!("Loaded {group_count} mesh(es) from {}", path.display()),
            Event::ExistingMaterialKept { group, material } => debug!("Mesh '{group}' has existing material '{material}'"),
            Event::DefaultMaterialAssigned { group } => debug!("Applying default material to mesh '{group}'"),
            Event::ConversionStarted { input } => info!("Converting {} to GLB format...", input.display()),
            Event::ConversionSucceeded { output, file_size } => {
                info!("Successfully converted to {} ({})", output.display(), crate::format_file_size(file_size))
            }
            Event::ConversionFailed { input, message } => error!("Conversion of {} failed: {message}", input.display()),
            Event::ThumbnailWritten { path } => info!("Generated thumbnail: {}", path.display()),
            Event::ThumbnailFailed { path, message } => warn!("Failed to generate thumbnail {}: {message}", path.display()),
            Event::PreviewWritten { path } => info!("Generated preview: {}", path.display()),
            Event::PreviewFailed { path, message } => warn!("Failed to generate preview {}: {message}", path.display()),
            Event::BatchStarted { file_count } => info!("Found {file_count} OBJ file(s) to convert"),
            Event::BatchFinished { succeeded, failed } => {
                info!("Batch conversion complete! Successful: {succeeded}, Failed: {failed}, Total: {}", succeeded + failed)
            }
        }
    }
}

impl Observer for Sender<Event> {
    fn notify(&self, event: Event) {
        // A dropped receiver only means that nobody is interested anymore.
        let _ = self.send(event);
    }
}

#[cfg(test)]
mod tests {
    use objglb_shared::crossbeam_channel;

    use super::*;

    #[test]
    fn sender_captures_events() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        sender.notify(Event::DefaultMaterialUsed);
        assert_eq!(receiver.try_recv().unwrap(), Event::DefaultMaterialUsed);
    }

    #[test]
    fn sender_without_receiver_does_not_panic() {
        let (sender, receiver) = crossbeam_channel::unbounded();
        drop(receiver);
        sender.notify(Event::DefaultMaterialUsed);
    }

    #[test]
    fn log_observer_accepts_every_event() {
        objglb_test::setup_logger();
        LogObserver.notify(Event::TextureNotFound {
            reference: "missing.png".to_owned(),
        });
        LogObserver.notify(Event::BatchFinished { succeeded: 1, failed: 2 });
    }
}
