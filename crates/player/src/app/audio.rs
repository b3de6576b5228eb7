use host::AudioEngine;

/// Engine backed by the default output device. The device is only opened on
/// the first user gesture.
#[cfg(feature = "audio")]
pub(crate) fn build_engine() -> AudioEngine {
    AudioEngine::new(Box::new(|| {
        let output = device::RodioOutput::open()?;
        Ok(Box::new(output) as Box<dyn host::AudioOutput>)
    }))
}

#[cfg(not(feature = "audio"))]
pub(crate) fn build_engine() -> AudioEngine {
    tracing::info!("audio feature disabled; sound cues are silent");
    AudioEngine::silent()
}

#[cfg(feature = "audio")]
mod device {
    use std::time::Duration;

    use host::{AudioError, AudioOutput, CueVoice};
    use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
    use tracing::{debug, info};

    pub(crate) struct RodioOutput {
        _stream: OutputStream,
        handle: OutputStreamHandle,
    }

    impl RodioOutput {
        pub(crate) fn open() -> Result<Self, AudioError> {
            let (stream, handle) = OutputStream::try_default()
                .map_err(|err| AudioError::OutputUnavailable(err.to_string()))?;
            info!("audio_output_opened");
            Ok(Self {
                _stream: stream,
                handle,
            })
        }
    }

    impl AudioOutput for RodioOutput {
        fn resume(&mut self) -> Result<(), AudioError> {
            // the device stream starts playing as soon as it is built
            Ok(())
        }

        fn play(&mut self, voice: CueVoice) {
            let sink = match Sink::try_new(&self.handle) {
                Ok(sink) => sink,
                Err(err) => {
                    debug!(error = %err, "audio_sink_unavailable");
                    return;
                }
            };
            sink.append(CueSource(voice));
            sink.detach();
        }
    }

    struct CueSource(CueVoice);

    impl Iterator for CueSource {
        type Item = f32;

        fn next(&mut self) -> Option<f32> {
            self.0.next()
        }

        fn size_hint(&self) -> (usize, Option<usize>) {
            self.0.size_hint()
        }
    }

    impl Source for CueSource {
        fn current_frame_len(&self) -> Option<usize> {
            None
        }

        fn channels(&self) -> u16 {
            1
        }

        fn sample_rate(&self) -> u32 {
            self.0.sample_rate()
        }

        fn total_duration(&self) -> Option<Duration> {
            Some(Duration::from_secs_f32(self.0.duration_seconds()))
        }
    }
}
