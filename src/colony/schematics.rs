//! Schematic style catalog

use crate::net::protocol::{SchematicsMessage, ServerMessage};
use crate::net::sink::{MessageSink, SendError};
use crate::sync::dirty::{SyncChannel, SyncPass, SyncSubsystem};

/// Known building styles; changes trigger a client catalog refresh
#[derive(Debug, Default)]
pub struct SchematicCatalog {
    styles: Vec<String>,
    dirty: bool,
}

impl SchematicCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the style list, marking dirty if it changed
    pub fn set_styles(&mut self, mut styles: Vec<String>) {
        styles.sort();
        styles.dedup();
        if styles != self.styles {
            self.styles = styles;
            self.dirty = true;
        }
    }

    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl SyncSubsystem for SchematicCatalog {
    fn channel(&self) -> SyncChannel {
        SyncChannel::Schematics
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn send_packets(&self, pass: &SyncPass<'_>, sink: &mut dyn MessageSink) -> Result<usize, SendError> {
        let recipients = pass.recipients(self.dirty);
        for client in &recipients {
            sink.send_to(*client, ServerMessage::Schematics(SchematicsMessage))?;
        }
        Ok(recipients.len())
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_styles_dirty_only_on_change() {
        let mut catalog = SchematicCatalog::new();
        catalog.set_styles(vec!["wooden".to_string(), "stone".to_string()]);
        assert!(catalog.is_dirty());
        assert_eq!(catalog.styles(), &["stone".to_string(), "wooden".to_string()]);

        catalog.clear_dirty();
        catalog.set_styles(vec!["wooden".to_string(), "stone".to_string(), "stone".to_string()]);
        assert!(!catalog.is_dirty());
    }
}
