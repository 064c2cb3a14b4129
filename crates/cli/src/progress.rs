//! Terminal rendering of export progress events.

use std::time::Duration;

use musicmirror_core::{ExportProgressEvent, ExportStage};

/// One line describing `event`, or `None` for events not worth printing.
pub fn render(event: &ExportProgressEvent) -> Option<String> {
    let line = match event.stage {
        ExportStage::ConvertEnd => format!(
            "[convert {}/{} eta {}] {}",
            event.conversions_done(),
            event.total_conversion_tasks,
            format_duration(event.conversion_eta()),
            event.message
        ),
        ExportStage::CopyEnd => format!(
            "[copy {}/{} eta {}] {}",
            event.copies_done(),
            event.total_copy_tasks,
            format_duration(event.copy_eta()),
            event.message
        ),
        ExportStage::DeleteEnd => format!("[delete] {}", event.message),
        ExportStage::Error => format!("[error] {}", event.message),
        ExportStage::Completed => format!(
            "{}: {}/{} files copied, {} converted in {}",
            event.message,
            event.copies_done(),
            event.total_copy_tasks,
            event.conversions_done(),
            format_duration(event.elapsed_conversion.max(event.elapsed_copy))
        ),
        ExportStage::CopyBegin | ExportStage::ConvertBegin | ExportStage::DeleteBegin => {
            return None
        }
    };
    Some(line)
}

/// `h:mm:ss` for long spans, `m:ss` otherwise.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(stage: ExportStage, message: &str) -> ExportProgressEvent {
        ExportProgressEvent {
            stage,
            message: message.to_string(),
            timestamp: Utc::now(),
            total_copy_tasks: 10,
            remaining_copy_tasks: 5,
            elapsed_copy: Duration::from_secs(50),
            total_conversion_tasks: 4,
            remaining_conversion_tasks: 3,
            elapsed_conversion: Duration::from_secs(30),
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "0:05");
        assert_eq!(format_duration(Duration::from_secs(125)), "2:05");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn test_render_copy_end() {
        let line = render(&event(ExportStage::CopyEnd, "Copied a.mp3")).unwrap();
        assert_eq!(line, "[copy 5/10 eta 0:50] Copied a.mp3");
    }

    #[test]
    fn test_render_convert_end() {
        let line = render(&event(ExportStage::ConvertEnd, "Converted a.flac")).unwrap();
        assert_eq!(line, "[convert 1/4 eta 1:30] Converted a.flac");
    }

    #[test]
    fn test_begin_events_are_silent() {
        assert!(render(&event(ExportStage::CopyBegin, "")).is_none());
        assert!(render(&event(ExportStage::ConvertBegin, "")).is_none());
    }
}
