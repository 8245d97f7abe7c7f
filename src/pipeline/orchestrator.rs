//! # Transcription Pipeline
//!
//! Sequences validation → normalization → transcription for one upload and
//! owns every temporary file the run creates.
//!
//! ## Guarantees:
//! - invalid uploads are rejected before anything touches the filesystem
//! - temp paths carry a per-request UUID, so concurrent uploads with the same
//!   filename never collide
//! - temp files are released by `TempArtifact` guards on every exit path,
//!   before `run` returns
//! - nothing escapes the boundary: panics and task failures come back as
//!   `AppError::Internal`

use crate::audio::normalizer::NormalizedAudio;
use crate::audio::{AudioNormalizer, DecodeError, FormatValidator};
use crate::error::AppError;
use crate::pipeline::artifacts::TempArtifact;
use crate::pipeline::observer::{PipelineObserver, PipelineStage};
use crate::pipeline::upload::{sanitize_stem, UploadedAudio};
use crate::transcription::{TranscriptionClient, TranscriptionOutcome};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

type Normalized = (NormalizedAudio, Option<TempArtifact>);

pub struct TranscriptionPipeline {
    temp_dir: PathBuf,
    validator: FormatValidator,
    normalizer: AudioNormalizer,
    client: TranscriptionClient,
    observer: Arc<dyn PipelineObserver>,
}

impl TranscriptionPipeline {
    pub fn new(
        temp_dir: PathBuf,
        client: TranscriptionClient,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            temp_dir,
            validator: FormatValidator,
            normalizer: AudioNormalizer::default(),
            client,
            observer,
        }
    }

    pub fn client(&self) -> &TranscriptionClient {
        &self.client
    }

    pub fn temp_dir(&self) -> &std::path::Path {
        &self.temp_dir
    }

    /// Run one upload through the pipeline. `request_id` tags every log
    /// line and names the temp files.
    ///
    /// ## Returns:
    /// - **Ok(outcome)**: the audio reached the recognizer; `ServiceError`
    ///   outcomes are still `Ok` here and mapped to 500 by the handler
    /// - **Err(AppError)**: rejected or failed before transcription
    pub async fn run(
        &self,
        request_id: Uuid,
        upload: UploadedAudio,
    ) -> Result<TranscriptionOutcome, AppError> {
        tracing::info!(
            %request_id,
            filename = upload.filename().unwrap_or(""),
            bytes = upload.size_bytes(),
            "Received upload"
        );

        let mut stage = PipelineStage::Received;
        let result = AssertUnwindSafe(self.execute(request_id, upload, &mut stage))
            .catch_unwind()
            .await;

        let result = match result {
            Ok(result) => result,
            Err(panic) => Err(AppError::Internal(panic_message(panic.as_ref()))),
        };

        match &result {
            Ok(outcome) => self.observer.completed(request_id, outcome),
            Err(error) => self.observer.stage_failed(request_id, stage, error),
        }

        result
    }

    async fn execute(
        &self,
        request_id: Uuid,
        upload: UploadedAudio,
        stage: &mut PipelineStage,
    ) -> Result<TranscriptionOutcome, AppError> {
        self.advance(request_id, stage, PipelineStage::Received);

        let extension = self.validator.validate(upload.filename())?;
        self.advance(request_id, stage, PipelineStage::Validated);

        let file_name = format!(
            "{}-{}.{}",
            request_id.simple(),
            sanitize_stem(upload.filename().unwrap_or_default()),
            extension
        );
        let uploaded = TempArtifact::write(self.temp_dir.join(file_name), upload.into_bytes()).await?;

        let (normalized, converted) = self
            .spawn_normalize(uploaded.path().to_path_buf())
            .await
            .map_err(|e| AppError::Internal(format!("normalization task failed: {}", e)))??;

        tracing::debug!(
            %request_id,
            path = %normalized.path.display(),
            reused = normalized.reused,
            frames = normalized.frames,
            sample_rate = ?normalized.sample_rate,
            "Audio normalized"
        );
        self.advance(request_id, stage, PipelineStage::Normalized);

        let outcome = self.client.transcribe(&normalized.path).await;
        self.advance(request_id, stage, PipelineStage::Transcribed);

        drop(converted);
        drop(uploaded);
        self.advance(request_id, stage, PipelineStage::Completed);

        Ok(outcome)
    }

    /// Normalize on the blocking pool. The converted file belongs to the
    /// task's output, so it is still removed when the awaiting request is
    /// dropped before the task finishes.
    fn spawn_normalize(&self, source: PathBuf) -> JoinHandle<Result<Normalized, DecodeError>> {
        let normalizer = self.normalizer.clone();
        tokio::task::spawn_blocking(move || {
            let normalized = normalizer.normalize(&source)?;
            let converted =
                (!normalized.reused).then(|| TempArtifact::adopt(normalized.path.clone()));
            Ok((normalized, converted))
        })
    }

    fn advance(&self, request_id: Uuid, stage: &mut PipelineStage, next: PipelineStage) {
        *stage = next;
        self.observer.stage_reached(request_id, next);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("unexpected failure: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("unexpected failure: {}", msg)
    } else {
        "unexpected failure".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::observer::testing::{ObservedEvent, RecordingObserver};
    use crate::pipeline::observer::TracingObserver;
    use crate::transcription::service::testing::{StubRecognitionService, StubReply};
    use crate::transcription::service::{
        RecognitionError, RecognitionRequest, RecognitionResponse, RecognitionService,
    };
    use crate::transcription::RecognitionConfig;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::path::Path;

    fn wav_bytes(sample_rate: u32, channels: u16, frames: usize, amplitude: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut buffer = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec).unwrap();
            for i in 0..frames {
                let sample = if i % 2 == 0 { amplitude } else { -amplitude };
                for _ in 0..channels {
                    writer.write_sample(sample).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        buffer
    }

    fn pipeline_with(
        dir: &Path,
        service: Arc<dyn RecognitionService>,
        observer: Arc<dyn PipelineObserver>,
    ) -> TranscriptionPipeline {
        let client = TranscriptionClient::new(service, Arc::new(RecognitionConfig::default()));
        TranscriptionPipeline::new(dir.to_path_buf(), client, observer)
    }

    fn pipeline(dir: &Path, reply: StubReply) -> (TranscriptionPipeline, Arc<StubRecognitionService>) {
        let stub = Arc::new(StubRecognitionService::new(reply));
        (pipeline_with(dir, stub.clone(), Arc::new(TracingObserver)), stub)
    }

    fn leftovers(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect()
    }

    #[actix_web::test]
    async fn test_wav_upload_is_transcribed_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, stub) = pipeline(dir.path(), StubReply::Transcript("bom dia"));
        let upload = UploadedAudio::new(Some("memo.wav".into()), wav_bytes(16_000, 1, 16_000, 3000));

        let outcome = pipeline.run(Uuid::new_v4(), upload).await.unwrap();

        assert_eq!(outcome, TranscriptionOutcome::Recognized("bom dia".to_string()));
        assert_eq!(stub.calls(), 1);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[actix_web::test]
    async fn test_non_wav_upload_is_normalized_to_16k_mono() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, stub) = pipeline(dir.path(), StubReply::Transcript("oi"));
        // WAV content under an .ogg name forces the conversion path.
        let upload = UploadedAudio::new(Some("voice.ogg".into()), wav_bytes(44_100, 2, 44_100, 3000));

        let outcome = pipeline.run(Uuid::new_v4(), upload).await.unwrap();

        assert_eq!(outcome, TranscriptionOutcome::Recognized("oi".to_string()));
        let sent = stub.last_request().unwrap();
        assert_eq!(sent.sample_rate, 16_000);
        assert_eq!(sent.samples.len(), 16_000 - crate::transcription::calibration::CHUNK_FRAMES);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[actix_web::test]
    async fn test_ogg_opus_voice_note_is_transcribed() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, stub) = pipeline(dir.path(), StubReply::Transcript("bom dia"));
        let bytes = crate::audio::ogg_opus::testing::ogg_opus_bytes(1, 100);
        let upload = UploadedAudio::new(Some("voice.ogg".into()), bytes);

        let outcome = pipeline.run(Uuid::new_v4(), upload).await.unwrap();

        assert_eq!(outcome, TranscriptionOutcome::Recognized("bom dia".to_string()));
        let sent = stub.last_request().unwrap();
        assert_eq!(sent.sample_rate, 16_000);
        assert!(!sent.samples.is_empty());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_abandoned_normalization_removes_converted_file() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path(), StubReply::NoSpeech);
        let source = dir.path().join("abandoned.ogg");
        std::fs::write(&source, wav_bytes(44_100, 2, 88_200, 3000)).unwrap();
        let converted = crate::audio::normalizer::converted_path(&source);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let handle = pipeline.spawn_normalize(source.clone());
            while !handle.is_finished() && !converted.exists() {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }
            // The request goes away while the blocking task may still be writing.
            drop(handle);
        });
        // Waits for the blocking pool to drain.
        drop(runtime);

        assert!(!converted.exists());
        assert_eq!(leftovers(dir.path()), vec![source]);
    }

    #[actix_web::test]
    async fn test_rejected_upload_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let stub = Arc::new(StubRecognitionService::new(StubReply::Transcript("x")));
        let pipeline = pipeline_with(dir.path(), stub.clone(), observer.clone());

        for name in [Some("notes.txt"), Some("voice"), Some(""), None] {
            let upload = UploadedAudio::new(name.map(String::from), b"data".to_vec());
            let err = pipeline.run(Uuid::new_v4(), upload).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)), "{:?}", name);
        }

        assert_eq!(stub.calls(), 0);
        assert!(leftovers(dir.path()).is_empty());
        assert_eq!(
            observer.events()[..2],
            [
                ObservedEvent::Reached(PipelineStage::Received),
                ObservedEvent::Failed(PipelineStage::Received, "validation_error".to_string()),
            ]
        );
    }

    #[actix_web::test]
    async fn test_validation_messages() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path(), StubReply::NoSpeech);

        let err = pipeline
            .run(Uuid::new_v4(), UploadedAudio::new(Some("notes.txt".into()), vec![1]))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "unsupported format");

        let err = pipeline
            .run(Uuid::new_v4(), UploadedAudio::new(Some(String::new()), vec![1]))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "empty filename");
    }

    #[actix_web::test]
    async fn test_decode_failure_cleans_up_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, stub) = pipeline(dir.path(), StubReply::Transcript("x"));
        let upload = UploadedAudio::new(Some("song.mp3".into()), b"not really an mp3 file".repeat(10));

        let err = pipeline.run(Uuid::new_v4(), upload).await.unwrap_err();

        assert!(matches!(err, AppError::DecodeError(_)));
        assert_eq!(stub.calls(), 0);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[actix_web::test]
    async fn test_service_failure_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, stub) = pipeline(dir.path(), StubReply::Unreachable);
        let upload = UploadedAudio::new(Some("voice.m4a".into()), wav_bytes(22_050, 1, 22_050, 3000));

        let outcome = pipeline.run(Uuid::new_v4(), upload).await.unwrap();

        assert!(matches!(outcome, TranscriptionOutcome::ServiceError(_)));
        assert_eq!(stub.calls(), 1);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[actix_web::test]
    async fn test_same_content_gives_same_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, _) = pipeline(dir.path(), StubReply::NoSpeech);
        let bytes = wav_bytes(16_000, 1, 8_000, 0);

        let first = UploadedAudio::new(Some("silence.wav".into()), bytes.clone());
        let first = pipeline.run(Uuid::new_v4(), first).await.unwrap();
        let second = UploadedAudio::new(Some("silence.wav".into()), bytes);
        let second = pipeline.run(Uuid::new_v4(), second).await.unwrap();

        assert_eq!(first, TranscriptionOutcome::Unrecognized);
        assert_eq!(first, second);
    }

    #[actix_web::test]
    async fn test_concurrent_uploads_with_same_name_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, stub) = pipeline(dir.path(), StubReply::Transcript("ok"));
        let a = UploadedAudio::new(Some("voice.ogg".into()), wav_bytes(44_100, 1, 22_050, 1000));
        let b = UploadedAudio::new(Some("voice.ogg".into()), wav_bytes(8_000, 2, 8_000, 2000));

        let (ra, rb) = futures_util::join!(
            pipeline.run(Uuid::new_v4(), a),
            pipeline.run(Uuid::new_v4(), b)
        );

        assert!(ra.is_ok());
        assert!(rb.is_ok());
        assert_eq!(stub.calls(), 2);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[actix_web::test]
    async fn test_observer_sees_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let stub = Arc::new(StubRecognitionService::new(StubReply::Transcript("ok")));
        let pipeline = pipeline_with(dir.path(), stub, observer.clone());

        let upload = UploadedAudio::new(Some("a.wav".into()), wav_bytes(16_000, 1, 1_600, 10));
        pipeline.run(Uuid::new_v4(), upload).await.unwrap();

        assert_eq!(
            observer.events(),
            vec![
                ObservedEvent::Reached(PipelineStage::Received),
                ObservedEvent::Reached(PipelineStage::Validated),
                ObservedEvent::Reached(PipelineStage::Normalized),
                ObservedEvent::Reached(PipelineStage::Transcribed),
                ObservedEvent::Reached(PipelineStage::Completed),
                ObservedEvent::Completed("recognized"),
            ]
        );
    }

    struct PanickingService;

    #[async_trait]
    impl RecognitionService for PanickingService {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn recognize(
            &self,
            _request: &RecognitionRequest,
        ) -> Result<RecognitionResponse, RecognitionError> {
            panic!("recognizer exploded")
        }
    }

    #[actix_web::test]
    async fn test_panic_is_contained_and_files_removed() {
        let dir = tempfile::tempdir().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let pipeline = pipeline_with(dir.path(), Arc::new(PanickingService), observer.clone());
        let upload = UploadedAudio::new(Some("voice.opus".into()), wav_bytes(16_000, 1, 16_000, 500));

        let err = pipeline.run(Uuid::new_v4(), upload).await.unwrap_err();

        assert_eq!(err, AppError::Internal("unexpected failure: recognizer exploded".to_string()));
        assert!(leftovers(dir.path()).is_empty());
        assert_eq!(
            observer.events().last(),
            Some(&ObservedEvent::Failed(PipelineStage::Normalized, "internal_error".to_string()))
        );
    }
}
