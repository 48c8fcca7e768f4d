//! Client-facing JSON shapes of hub events

use bufferflow_core::{CommandResult, CompletionKind, EventBus, EventSink, HubEvent, LineData};
use std::sync::{Arc, Mutex};

#[test]
fn test_completion_wire_shape() {
    let event = HubEvent::Command(CommandResult {
        kind: CompletionKind::Complete,
        id: "job-7".to_string(),
        port: "/dev/ttyUSB0".to_string(),
        queue_bytes: 42,
        command: "G1X10\n".to_string(),
    });

    let value: serde_json::Value = serde_json::from_str(&event.to_wire()).unwrap();
    assert_eq!(
        value,
        serde_json::json!({ "Cmd": "Complete", "Id": "job-7", "P": "/dev/ttyUSB0" })
    );
}

#[test]
fn test_error_wire_shape() {
    let event = HubEvent::Command(CommandResult {
        kind: CompletionKind::Error,
        id: "bad".to_string(),
        port: "COM3".to_string(),
        queue_bytes: 0,
        command: "G9\n".to_string(),
    });

    let value: serde_json::Value = serde_json::from_str(&event.to_wire()).unwrap();
    assert_eq!(value["Cmd"], "Error");
    assert!(value.get("BufSize").is_none());
}

#[test]
fn test_line_and_wipe_wire_shapes() {
    let line = HubEvent::Line(LineData::new("COM3", "ok"));
    let value: serde_json::Value = serde_json::from_str(&line.to_wire()).unwrap();
    assert_eq!(value, serde_json::json!({ "P": "COM3", "D": "ok\n" }));

    let wipe = HubEvent::WipedQueue {
        queue_count: 0,
        port: "COM3".to_string(),
    };
    let value: serde_json::Value = serde_json::from_str(&wipe.to_wire()).unwrap();
    assert_eq!(
        value,
        serde_json::json!({ "Cmd": "WipedQueue", "QCnt": 0, "Port": "COM3" })
    );

    let diagnostic = HubEvent::Diagnostic("Error writing to COM3: broken pipe".to_string());
    assert_eq!(diagnostic.to_wire(), "Error writing to COM3: broken pipe");
}

#[test]
fn test_bus_fans_out_to_every_subscriber() {
    let bus = EventBus::new();
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    for seen in [first.clone(), second.clone()] {
        bus.subscribe(move |event| seen.lock().unwrap().push(event));
    }

    let events = vec![
        HubEvent::Line(LineData::new("COM3", "ok")),
        HubEvent::WipedQueue {
            queue_count: 2,
            port: "COM3".to_string(),
        },
    ];
    for event in events.clone() {
        bus.publish(event);
    }

    assert_eq!(*first.lock().unwrap(), events);
    assert_eq!(*second.lock().unwrap(), events);
}
