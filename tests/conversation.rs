//! Conversation loop integration tests

use std::sync::Arc;
use std::time::Duration;

use iris_gateway::pointer::UploadPointer;
use iris_gateway::voice::{Role, VoiceSession};
use iris_gateway::{AnalysisMessage, ConversationLoop, Error, ImageAnalyzer, handoff_queue};
use tokio::sync::mpsc;

mod common;
use common::{FakeAnalyzer, RecordingSession};

fn build_loop(
    session: RecordingSession,
    analyzer: Arc<dyn ImageAnalyzer>,
) -> (ConversationLoop<RecordingSession>, iris_gateway::HandoffSender) {
    let (tx, rx) = handoff_queue();
    let conversation = ConversationLoop::new(session, rx, tx.clone(), analyzer);
    (conversation, tx)
}

#[tokio::test]
async fn test_queued_analysis_is_spoken_once() {
    let (mut conversation, queue) =
        build_loop(RecordingSession::default(), FakeAnalyzer::describing("unused"));

    queue
        .enqueue(AnalysisMessage::from_analysis("cat.png", "A cat on a rug."))
        .unwrap();

    assert!(conversation.step().await.unwrap());
    assert!(!conversation.step().await.unwrap());

    let session = conversation.session();
    assert_eq!(
        session.said,
        vec![(
            "I received an image upload. A cat on a rug.".to_string(),
            true
        )]
    );

    let entry = session.history().last().unwrap();
    assert_eq!(entry.role, Role::System);
    assert!(entry.content.contains("cat.png"));
    assert!(entry.content.contains("A cat on a rug."));
}

#[tokio::test]
async fn test_one_item_per_iteration_in_order() {
    let (mut conversation, queue) =
        build_loop(RecordingSession::default(), FakeAnalyzer::describing("unused"));

    for name in ["a.png", "b.png", "c.png"] {
        queue
            .enqueue(AnalysisMessage::from_analysis(name, format!("Image {name}.")))
            .unwrap();
    }

    assert!(conversation.step().await.unwrap());
    assert_eq!(conversation.session().said.len(), 1);

    assert!(conversation.step().await.unwrap());
    assert!(conversation.step().await.unwrap());
    assert!(!conversation.step().await.unwrap());

    let said: Vec<&str> = conversation
        .session()
        .said
        .iter()
        .map(|(text, _)| text.as_str())
        .collect();
    assert_eq!(
        said,
        vec![
            "I received an image upload. Image a.png.",
            "I received an image upload. Image b.png.",
            "I received an image upload. Image c.png.",
        ]
    );
}

#[tokio::test]
async fn test_greeting_is_spoken() {
    let (mut conversation, _queue) =
        build_loop(RecordingSession::default(), FakeAnalyzer::describing("unused"));

    conversation.greet("Hi there").await.unwrap();

    assert_eq!(
        conversation.session().said,
        vec![("Hi there".to_string(), true)]
    );
}

#[tokio::test]
async fn test_pointer_upload_is_spoken_next_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("fox.jpg");
    std::fs::write(&image, b"jpeg bytes").unwrap();

    let pointer = UploadPointer::new(dir.path().join("last_uploaded_image.txt"));
    pointer.write(&image).await.unwrap();

    let (conversation, _queue) =
        build_loop(RecordingSession::default(), FakeAnalyzer::describing("A fox."));
    let mut conversation = conversation.with_pointer(pointer.clone());

    // Detected and analyzed, but nothing spoken yet
    assert!(!conversation.step().await.unwrap());
    assert!(conversation.session().said.is_empty());
    assert!(!pointer.path().exists());

    assert!(conversation.step().await.unwrap());
    assert_eq!(
        conversation.session().said,
        vec![("I received an image upload. A fox.".to_string(), true)]
    );
    assert!(
        conversation
            .session()
            .history()
            .last()
            .unwrap()
            .content
            .contains("fox.jpg")
    );
}

#[tokio::test]
async fn test_pointer_to_missing_file_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let pointer = UploadPointer::new(dir.path().join("last_uploaded_image.txt"));
    pointer.write(&dir.path().join("gone.png")).await.unwrap();

    let (conversation, _queue) =
        build_loop(RecordingSession::default(), FakeAnalyzer::describing("unused"));
    let mut conversation = conversation.with_pointer(pointer.clone());

    assert!(!conversation.step().await.unwrap());
    assert!(!conversation.step().await.unwrap());
    assert!(conversation.session().said.is_empty());
    assert!(pointer.path().exists());
}

#[tokio::test]
async fn test_failed_analysis_becomes_apology() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("blurry.png");
    std::fs::write(&image, b"png bytes").unwrap();

    let pointer = UploadPointer::new(dir.path().join("last_uploaded_image.txt"));
    pointer.write(&image).await.unwrap();

    let (conversation, _queue) = build_loop(RecordingSession::default(), FakeAnalyzer::failing());
    let mut conversation = conversation.with_pointer(pointer);

    conversation.step().await.unwrap();
    assert!(conversation.step().await.unwrap());

    let (text, _) = &conversation.session().said[0];
    assert!(text.starts_with("I received an image upload. Sorry"));
    assert!(text.contains("blurry.png"));
}

#[tokio::test]
async fn test_say_failure_ends_the_loop() {
    let (conversation, queue) =
        build_loop(RecordingSession::failing(), FakeAnalyzer::describing("unused"));
    queue
        .enqueue(AnalysisMessage::from_analysis("cat.png", "A cat."))
        .unwrap();

    let (_shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let result = conversation.run(&mut shutdown_rx).await;

    assert!(matches!(result, Err(Error::Voice(_))));
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_shutdown() {
    let (conversation, queue) =
        build_loop(RecordingSession::default(), FakeAnalyzer::describing("unused"));
    let conversation = conversation.with_tick(Duration::from_millis(100));

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        queue
            .enqueue(AnalysisMessage::from_analysis("late.png", "Too late."))
            .unwrap();
        shutdown_tx.send(()).await.unwrap();
    });

    let started = tokio::time::Instant::now();
    conversation.run(&mut shutdown_rx).await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(400));
    stopper.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_stalled_say() {
    let (conversation, queue) =
        build_loop(RecordingSession::hanging(), FakeAnalyzer::describing("unused"));
    queue
        .enqueue(AnalysisMessage::from_analysis("cat.png", "A cat."))
        .unwrap();

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(()).await.unwrap();
    });

    let started = tokio::time::Instant::now();
    tokio::time::timeout(Duration::from_secs(60), conversation.run(&mut shutdown_rx))
        .await
        .expect("shutdown should end a stalled iteration")
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_shutdown_sender_keeps_running() {
    let (conversation, queue) =
        build_loop(RecordingSession::default(), FakeAnalyzer::describing("unused"));
    let conversation = conversation.with_tick(Duration::from_millis(100));

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    drop(shutdown_tx);

    queue
        .enqueue(AnalysisMessage::from_analysis("cat.png", "A cat."))
        .unwrap();

    let outcome =
        tokio::time::timeout(Duration::from_secs(5), conversation.run(&mut shutdown_rx)).await;

    assert!(outcome.is_err(), "loop stopped without a shutdown signal");
}
