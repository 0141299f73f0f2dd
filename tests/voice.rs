//! Speech channel integration tests
//!
//! Drives the channel with a scripted engine, no audio hardware needed

use std::sync::{Arc, Mutex};

use r3_assistant::voice::{ChannelState, RecognitionErrorKind, SpeechChannel, Voice};

mod common;

use common::{RecordingSynthesizer, ScriptedBackend};

fn channel_with(backend: &ScriptedBackend, synth: &RecordingSynthesizer) -> SpeechChannel {
    SpeechChannel::new(
        Arc::new(backend.clone()),
        Box::new(synth.clone()),
        "en-US",
        vec!["Samantha".to_string()],
    )
}

/// Callback that records every utterance it receives
fn collector() -> (Arc<Mutex<Vec<String>>>, Box<dyn FnMut(String) + Send>) {
    let heard = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&heard);
    (heard, Box::new(move |text| sink.lock().unwrap().push(text)))
}

#[test]
fn test_second_start_is_a_no_op() {
    let backend = ScriptedBackend::new();
    let mut channel = channel_with(&backend, &RecordingSynthesizer::new());

    channel.start_listening(collector().1).unwrap();
    assert_eq!(channel.state(), ChannelState::Starting);

    // Still starting
    channel.start_listening(collector().1).unwrap();
    assert_eq!(backend.engines_created(), 1);

    channel.process_pending();
    assert_eq!(channel.state(), ChannelState::Listening);

    // Listening
    channel.start_listening(collector().1).unwrap();
    assert_eq!(backend.engines_created(), 1);
    assert_eq!(backend.starts(), [1]);
}

#[test]
fn test_each_result_reaches_callback_once() {
    let backend = ScriptedBackend::new();
    let mut channel = channel_with(&backend, &RecordingSynthesizer::new());
    let (heard, callback) = collector();

    channel.start_listening(callback).unwrap();
    channel.process_pending();

    backend.say("hello there");
    channel.process_pending();
    backend.say("how are you");
    channel.process_pending();

    assert_eq!(*heard.lock().unwrap(), ["hello there", "how are you"]);
}

#[test]
fn test_end_of_capture_restarts_same_engine() {
    let backend = ScriptedBackend::new();
    let mut channel = channel_with(&backend, &RecordingSynthesizer::new());

    channel.start_listening(collector().1).unwrap();
    channel.process_pending();

    backend.latest().ended();
    channel.process_pending();

    assert_eq!(channel.state(), ChannelState::Listening);
    assert_eq!(backend.starts(), [1, 1]);
    assert_eq!(backend.engines_created(), 1);
}

#[test]
fn test_no_speech_restarts_like_end() {
    let backend = ScriptedBackend::new();
    let mut channel = channel_with(&backend, &RecordingSynthesizer::new());

    channel.start_listening(collector().1).unwrap();
    channel.process_pending();

    backend.no_speech();
    channel.process_pending();

    assert_eq!(channel.state(), ChannelState::Listening);
    assert_eq!(backend.starts(), [1, 1]);
}

#[test]
fn test_other_errors_tear_down() {
    let backend = ScriptedBackend::new();
    let mut channel = channel_with(&backend, &RecordingSynthesizer::new());

    channel.start_listening(collector().1).unwrap();
    channel.process_pending();

    backend.latest().errored(RecognitionErrorKind::NotAllowed);
    channel.process_pending();

    assert_eq!(channel.state(), ChannelState::Idle);
    assert_eq!(channel.active_engine_id(), None);
    assert_eq!(backend.aborts(), [1]);
    assert_eq!(backend.starts(), [1]);
}

#[test]
fn test_events_from_stopped_engine_are_ignored() {
    let backend = ScriptedBackend::new();
    let mut channel = channel_with(&backend, &RecordingSynthesizer::new());
    let (heard, callback) = collector();

    channel.start_listening(callback).unwrap();
    channel.process_pending();

    channel.stop_listening();
    assert!(channel.is_stopped());
    assert_eq!(channel.state(), ChannelState::Idle);
    assert_eq!(backend.aborts(), [1]);

    // The abandoned engine keeps talking
    let stale = backend.sink(1);
    stale.result("ghost");
    stale.ended();
    stale.errored(RecognitionErrorKind::NoSpeech);
    assert_eq!(channel.process_pending(), 3);

    assert_eq!(channel.state(), ChannelState::Idle);
    assert_eq!(backend.starts(), [1]);
    assert!(heard.lock().unwrap().is_empty());
}

#[test]
fn test_restart_after_stop_uses_fresh_engine() {
    let backend = ScriptedBackend::new();
    let mut channel = channel_with(&backend, &RecordingSynthesizer::new());
    let (heard, callback) = collector();

    channel.start_listening(collector().1).unwrap();
    channel.process_pending();
    channel.stop_listening();

    channel.start_listening(callback).unwrap();
    assert!(!channel.is_stopped());
    assert_eq!(channel.active_engine_id(), Some(2));

    backend.sink(1).result("old");
    backend.sink(2).result("new");
    channel.process_pending();

    assert_eq!(*heard.lock().unwrap(), ["new"]);
    assert_eq!(channel.state(), ChannelState::Listening);
}

#[test]
fn test_unsupported_capture_leaves_channel_idle() {
    let backend = ScriptedBackend::unsupported();
    let mut channel = channel_with(&backend, &RecordingSynthesizer::new());

    let err = channel.start_listening(collector().1).unwrap_err();

    assert!(matches!(err, r3_assistant::Error::SpeechUnsupported(_)));
    assert_eq!(channel.state(), ChannelState::Idle);
    assert_eq!(channel.active_engine_id(), None);
}

#[test]
fn test_speak_cancels_and_prefers_configured_voice() {
    let synth = RecordingSynthesizer::new();
    let mut channel = channel_with(&ScriptedBackend::new(), &synth);

    channel.speak("first").unwrap();
    channel.speak("second").unwrap();

    let requests = synth.requests();
    assert_eq!(synth.cancels(), 2);
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].text, "second");
    assert_eq!(
        requests[1].voice.as_ref().map(|v| v.name.as_str()),
        Some("Samantha")
    );
}

#[test]
fn test_speak_falls_back_to_language_then_default() {
    let synth = RecordingSynthesizer::with_voices(vec![
        Voice::new("Thomas", "fr-FR"),
        Voice::new("Moira", "en-IE"),
    ]);
    let mut channel = channel_with(&ScriptedBackend::new(), &synth);
    channel.speak("hello").unwrap();

    let french = RecordingSynthesizer::with_voices(vec![Voice::new("Thomas", "fr-FR")]);
    let mut fallback = channel_with(&ScriptedBackend::new(), &french);
    fallback.speak("hello").unwrap();

    assert_eq!(
        synth.requests()[0].voice.as_ref().map(|v| v.name.as_str()),
        Some("Moira")
    );
    assert_eq!(french.requests()[0].voice, None);
}

#[test]
fn test_unsupported_synthesis_is_reported() {
    let synth = RecordingSynthesizer::unsupported();
    let mut channel = channel_with(&ScriptedBackend::new(), &synth);

    assert!(matches!(
        channel.speak("hello"),
        Err(r3_assistant::Error::SpeechUnsupported(_))
    ));
}
