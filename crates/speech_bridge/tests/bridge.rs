#![cfg(unix)]

use std::sync::mpsc;
use std::time::{Duration, Instant};

use speech_bridge::{RecognizerCommand, SpeechBridge, StartError};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn shell(script: &str) -> RecognizerCommand {
    RecognizerCommand::new("sh").arg("-c").arg(script)
}

fn collect_until_closed(receiver: &mpsc::Receiver<String>) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(utterance) = receiver.recv_timeout(RECV_TIMEOUT) {
        seen.push(utterance);
    }
    seen
}

#[test]
fn delivers_marker_stripped_utterances_in_line_order() {
    let bridge = SpeechBridge::new(shell("printf '🗣️ hello world\\n\\n  \\nplain text\\n'"));
    let (sender, receiver) = mpsc::channel();

    bridge
        .start_listening(move |utterance| {
            let _ = sender.send(utterance);
        })
        .expect("recognizer should launch");

    let seen = collect_until_closed(&receiver);
    assert_eq!(seen, vec!["hello world".to_string(), "plain text".to_string()]);
    bridge.stop_listening();
}

#[test]
fn stderr_output_is_merged_into_the_utterance_stream() {
    let bridge = SpeechBridge::new(shell("echo from-stdout; echo from-stderr 1>&2"));
    let (sender, receiver) = mpsc::channel();

    bridge
        .start_listening(move |utterance| {
            let _ = sender.send(utterance);
        })
        .expect("recognizer should launch");

    let mut seen = collect_until_closed(&receiver);
    seen.sort();
    assert_eq!(seen, vec!["from-stderr".to_string(), "from-stdout".to_string()]);
    bridge.stop_listening();
}

#[test]
fn stop_before_start_and_repeated_stop_are_no_ops() {
    let bridge = SpeechBridge::new(shell("sleep 30"));

    bridge.stop_listening();
    assert!(!bridge.is_listening());

    bridge
        .start_listening(|_| {})
        .expect("recognizer should launch");
    assert!(bridge.is_listening());

    bridge.stop_listening();
    bridge.stop_listening();
    assert!(!bridge.is_listening());
}

#[test]
fn start_while_active_fails_without_disturbing_the_running_process() {
    // First child stays alive until its stdin-independent sleep ends or it
    // is terminated; it prints a line only after a short delay so we can
    // observe it surviving the rejected second start.
    let bridge = SpeechBridge::new(shell("sleep 0.3; echo still here"));
    let (sender, receiver) = mpsc::channel();

    bridge
        .start_listening(move |utterance| {
            let _ = sender.send(utterance);
        })
        .expect("first start should succeed");

    let second = bridge.start_listening(|_| {});
    assert!(matches!(second, Err(StartError::AlreadyListening)));

    assert_eq!(
        receiver.recv_timeout(RECV_TIMEOUT).as_deref(),
        Ok("still here")
    );
    bridge.stop_listening();
}

#[test]
fn graceful_termination_ends_a_long_running_recognizer() {
    let bridge = SpeechBridge::new(shell("sleep 30"));
    bridge
        .start_listening(|_| {})
        .expect("recognizer should launch");
    assert!(bridge.is_listening());

    let started = Instant::now();
    bridge.stop_listening();

    assert!(!bridge.is_listening());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn term_ignoring_recognizer_is_force_killed_after_the_grace_period() {
    let bridge = SpeechBridge::new(shell("trap '' TERM; sleep 30"));
    bridge
        .start_listening(|_| {})
        .expect("recognizer should launch");

    let started = Instant::now();
    bridge.stop_listening();

    assert!(!bridge.is_listening());
    // Grace period is 1s; allow scheduling slack but prove the bound held.
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn session_is_restartable_after_the_recognizer_exits_on_its_own() {
    let bridge = SpeechBridge::new(shell("echo one"));
    let (sender, receiver) = mpsc::channel();

    bridge
        .start_listening({
            let sender = sender.clone();
            move |utterance| {
                let _ = sender.send(utterance);
            }
        })
        .expect("first start should succeed");
    assert_eq!(receiver.recv_timeout(RECV_TIMEOUT).as_deref(), Ok("one"));

    // Wait for the child to be reaped as exited, then start a new session.
    let deadline = Instant::now() + RECV_TIMEOUT;
    while bridge.is_listening() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    bridge
        .start_listening(move |utterance| {
            let _ = sender.send(utterance);
        })
        .expect("restart after natural exit should succeed");
    bridge.stop_listening();
}
