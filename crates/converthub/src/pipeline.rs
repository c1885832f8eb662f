//! The file conversion pipeline.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::converter::ConvertError;
use crate::job::{FileJob, JobError, JobOutcome, JobStatus, JobStore};
use crate::properties::Properties;
use crate::registry::ConverterRegistry;

/// Why a claimed job ended in `failed`.
///
/// These never escape [`FileConversionPipeline::process`]; they become
/// the job's `error_message`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unsupported conversion: {input_format} -> {output_format}")]
    UnsupportedFormat {
        input_format: String,
        output_format: String,
    },

    #[error("failed to read input {}: {source}", path.display())]
    ReadInput { path: PathBuf, source: io::Error },

    #[error("failed to write output {}: {source}", path.display())]
    WriteOutput { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Converter(#[from] ConvertError),
}

/// Drives jobs from `pending` to a terminal state.
///
/// The pipeline is the sole writer of job state while a job is
/// processing: it claims with an atomic compare-and-set and finishes
/// with a terminal write, both through the [`JobStore`].
#[derive(Clone)]
pub struct FileConversionPipeline {
    store: Arc<dyn JobStore>,
    converters: Arc<ConverterRegistry>,
}

impl FileConversionPipeline {
    pub fn new(store: Arc<dyn JobStore>, converters: Arc<ConverterRegistry>) -> Self {
        Self { store, converters }
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    /// Process one job to a terminal state.
    ///
    /// A missing job and a lost claim are the only errors the caller
    /// sees. Everything downstream of the claim (unsupported pair,
    /// I/O, converter failure) is recorded on the job as `failed`, and
    /// the terminal snapshot is returned as `Ok`. Never retries.
    pub fn process(&self, id: u64) -> Result<FileJob, JobError> {
        let job = self
            .store
            .transition(id, JobStatus::Pending, JobStatus::Processing)?;
        debug!(
            job = id,
            from = %job.input_format,
            to = %job.output_format,
            "claimed file job"
        );

        match self.run(&job) {
            Ok(outcome) => {
                let done = self.store.finish(id, outcome)?;
                info!(
                    job = id,
                    status = %done.status,
                    size_output = done.size_output,
                    "file job completed"
                );
                Ok(done)
            }
            Err(err) => {
                warn!(job = id, error = %err, "file job failed");
                self.store.finish(
                    id,
                    JobOutcome::Failed {
                        error_message: err.to_string(),
                    },
                )
            }
        }
    }

    fn run(&self, job: &FileJob) -> Result<JobOutcome, PipelineError> {
        // Converter lookup comes first: an unsupported pair must fail
        // without touching the input file or invoking any converter.
        let converter = self
            .converters
            .lookup(&job.input_format, &job.output_format)
            .ok_or_else(|| PipelineError::UnsupportedFormat {
                input_format: job.input_format.clone(),
                output_format: job.output_format.clone(),
            })?;

        let input = fs::read(&job.input_file).map_err(|source| PipelineError::ReadInput {
            path: job.input_file.clone(),
            source,
        })?;
        let size_input = input.len() as u64;

        // Duration covers the converter call only, not file I/O.
        let started = Instant::now();
        let output = converter.convert(&input, &Properties::new())?;
        let duration = started.elapsed();

        let output_file = output_path(job);
        fs::write(&output_file, &output).map_err(|source| PipelineError::WriteOutput {
            path: output_file.clone(),
            source,
        })?;

        Ok(JobOutcome::Completed {
            output_file,
            size_input,
            size_output: output.len() as u64,
            duration_secs: duration.as_secs_f64(),
        })
    }
}

/// Input path with the extension swapped for the output format.
fn output_path(job: &FileJob) -> PathBuf {
    let mut path = job.input_file.with_extension(&job.output_format);
    if path == job.input_file {
        // Same-format conversion must not clobber the input.
        path.set_extension(format!("out.{}", job.output_format));
    }
    path
}
