//! Orchestrator: drives the interpreter and the panel per sample.

use anyhow::{anyhow, Context, Result};
use burn::tensor::backend::Backend;
use cifar_panel_hw::DisplayAdapter;
use cifar_panel_infer::{Interpreter, Model, TensorArena, IMAGE_SIZE};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::{label_name, Dataset, Sample};
use crate::prediction::{confidence_text, prediction_text, rounded_confidence, top_prediction};

/// How recoverable faults (schema mismatch, wrong tensor types, failed
/// invocation) are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Log the fault and keep going
    #[default]
    Continue,
    /// Stop at the first fault
    Abort,
}

impl FaultPolicy {
    /// Applies the policy to a fault, returning an error only when aborting.
    pub fn handle(self, fault: &cifar_panel_infer::Error) -> Result<()> {
        match self {
            FaultPolicy::Continue => {
                warn!("{}", fault);
                Ok(())
            }
            FaultPolicy::Abort => Err(anyhow!("Aborting on fault: {}", fault)),
        }
    }
}

/// Where results are placed on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub image_x: u32,
    pub image_y: u32,
    pub prediction_line: u16,
    pub confidence_line: u16,
}

/// Orchestrator progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Initialized,
    SetInput,
    Infer,
    Display,
    Done,
}

/// Result for one sample.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub index: usize,
    pub truth: u8,
    pub truth_label: Option<&'static str>,
    pub predicted: Option<usize>,
    pub predicted_label: Option<&'static str>,
    pub score: Option<u8>,
    pub confidence: Option<f64>,
    pub fault: Option<String>,
}

impl Outcome {
    fn new(index: usize, sample: &Sample) -> Self {
        Self {
            index,
            truth: sample.label(),
            truth_label: label_name(sample.label() as usize),
            predicted: None,
            predicted_label: None,
            score: None,
            confidence: None,
            fault: None,
        }
    }

    /// True when the prediction matches the ground truth.
    pub fn is_correct(&self) -> bool {
        self.predicted == Some(self.truth as usize)
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<Outcome>,
    pub correct: usize,
    pub faults: usize,
}

impl RunReport {
    fn new(outcomes: Vec<Outcome>) -> Self {
        let correct = outcomes.iter().filter(|o| o.is_correct()).count();
        let faults = outcomes.iter().filter(|o| o.fault.is_some()).count();
        Self {
            outcomes,
            correct,
            faults,
        }
    }

    /// Fraction of samples classified correctly.
    pub fn accuracy(&self) -> f64 {
        if self.outcomes.is_empty() {
            0.0
        } else {
            self.correct as f64 / self.outcomes.len() as f64
        }
    }
}

/// Parses a model, checks its schema, and plans the arena.
///
/// Arena overflow is always fatal; the schema and tensor type checks follow
/// `policy`.
pub fn prepare_interpreter<B: Backend>(
    model_bytes: &[u8],
    arena_size: usize,
    policy: FaultPolicy,
    device: &B::Device,
) -> Result<Interpreter<B>> {
    let model = Model::from_bytes(model_bytes).context("Failed to parse model")?;
    if let Err(fault) = model.check_schema() {
        policy.handle(&fault)?;
    }

    let mut interpreter = Interpreter::new(&model, TensorArena::new(arena_size), device)
        .context("Failed to build interpreter")?;
    interpreter
        .allocate_tensors()
        .context("Tensor allocation failed")?;

    if let Err(fault) = interpreter.check_input_type() {
        policy.handle(&fault)?;
    }
    if let Err(fault) = interpreter.check_output_type() {
        policy.handle(&fault)?;
    }

    Ok(interpreter)
}

/// Runs every sample of a dataset through the model and onto the panel.
pub struct Runner<'a, B: Backend, P: DisplayAdapter> {
    interpreter: &'a mut Interpreter<B>,
    panel: &'a mut P,
    layout: Layout,
    policy: FaultPolicy,
    stage: Stage,
}

impl<'a, B: Backend, P: DisplayAdapter> Runner<'a, B, P> {
    pub fn new(
        interpreter: &'a mut Interpreter<B>,
        panel: &'a mut P,
        layout: Layout,
        policy: FaultPolicy,
    ) -> Self {
        Self {
            interpreter,
            panel,
            layout,
            policy,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Initializes the panel and classifies every sample in order.
    pub fn run(&mut self, dataset: &Dataset) -> Result<RunReport> {
        self.panel
            .initialize()
            .context("Failed to initialize display")?;
        self.stage = Stage::Initialized;

        let mut outcomes = Vec::with_capacity(dataset.len());
        for (index, sample) in dataset.iter().enumerate() {
            outcomes.push(self.classify(index, sample)?);
        }
        self.stage = Stage::Done;

        let report = RunReport::new(outcomes);
        info!(
            "Run complete: {}/{} correct ({:.1}%), {} faults",
            report.correct,
            report.outcomes.len(),
            report.accuracy() * 100.0,
            report.faults
        );
        Ok(report)
    }

    fn classify(&mut self, index: usize, sample: &Sample) -> Result<Outcome> {
        let mut outcome = Outcome::new(index, sample);
        let image = sample.interleaved();

        self.stage = Stage::SetInput;
        self.interpreter
            .set_input(&image)
            .with_context(|| format!("Failed to stage image {}", index))?;

        self.stage = Stage::Infer;
        if let Err(fault) = self.interpreter.invoke() {
            self.policy.handle(&fault)?;
            outcome.fault = Some(fault.to_string());
            return Ok(outcome);
        }

        let scores = self.interpreter.scores()?;
        let top = top_prediction(&scores).context("Model produced no scores")?;
        let score = scores[top];
        let label = label_name(top).unwrap_or("?");

        self.stage = Stage::Display;
        self.panel
            .show_text(self.layout.prediction_line, &prediction_text(label))?;
        self.panel
            .show_text(self.layout.confidence_line, &confidence_text(score))?;
        self.panel.draw_image(
            IMAGE_SIZE as u32,
            IMAGE_SIZE as u32,
            &image,
            self.layout.image_x,
            self.layout.image_y,
        )?;

        info!(
            "Image {}: predicted {} ({:.1}%), actual {}",
            index,
            label,
            rounded_confidence(score),
            outcome.truth_label.unwrap_or("?")
        );

        outcome.predicted = Some(top);
        outcome.predicted_label = label_name(top);
        outcome.score = Some(score);
        outcome.confidence = Some(rounded_confidence(score));
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::record;
    use cifar_panel_hw::{LcdPanel, PanelSettings};
    use cifar_panel_infer::{
        export_model, CifarNetConfig, CpuBackend, ElementType, ModelHeader, DEFAULT_ARENA_SIZE,
        SCHEMA_VERSION,
    };
    use embedded_hal::delay::DelayNs;

    const LAYOUT: Layout = Layout {
        image_x: 300,
        image_y: 100,
        prediction_line: 8,
        confidence_line: 9,
    };

    /// Display calls in the order they were made.
    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Init,
        Text(u16, String),
        Image(u32, u32, Vec<u8>, u32, u32),
    }

    #[derive(Default)]
    struct RecordingPanel {
        calls: Vec<Call>,
    }

    impl DisplayAdapter for RecordingPanel {
        fn initialize(&mut self) -> cifar_panel_hw::Result<()> {
            self.calls.push(Call::Init);
            Ok(())
        }

        fn draw_image(
            &mut self,
            width: u32,
            height: u32,
            pixels: &[u8],
            x: u32,
            y: u32,
        ) -> cifar_panel_hw::Result<()> {
            self.calls
                .push(Call::Image(width, height, pixels.to_vec(), x, y));
            Ok(())
        }

        fn show_text(&mut self, line: u16, text: &str) -> cifar_panel_hw::Result<()> {
            self.calls.push(Call::Text(line, text.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDelay {
        pauses: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.pauses.push(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.pauses.push(ms);
        }
    }

    fn model_bytes(schema_version: u32) -> Vec<u8> {
        export_with(ModelHeader {
            schema_version,
            ..ModelHeader::cifar10()
        })
    }

    fn export_with(header: ModelHeader) -> Vec<u8> {
        let device = Default::default();
        let network = CifarNetConfig::new().init::<CpuBackend>(&device);
        export_model(network, header).unwrap()
    }

    /// An interpreter whose header declares fewer classes than the network
    /// produces, so every invoke fails.
    fn failing_interpreter() -> Interpreter<CpuBackend> {
        let device = Default::default();
        let network = CifarNetConfig::new().init::<CpuBackend>(&device);
        let header = ModelHeader {
            num_classes: 5,
            ..ModelHeader::cifar10()
        };
        let mut interp = Interpreter::from_network(
            header,
            network,
            TensorArena::new(DEFAULT_ARENA_SIZE),
            &device,
        )
        .unwrap();
        interp.allocate_tensors().unwrap();
        interp
    }

    fn interpreter() -> Interpreter<CpuBackend> {
        prepare_interpreter(
            &model_bytes(SCHEMA_VERSION),
            DEFAULT_ARENA_SIZE,
            FaultPolicy::Continue,
            &Default::default(),
        )
        .unwrap()
    }

    fn dataset() -> Dataset {
        let bytes: Vec<u8> = (0..10u8)
            .flat_map(|i| record(i, i * 20, 255 - i * 20, i * 7))
            .collect();
        Dataset::from_bytes(&bytes, 10).unwrap()
    }

    #[test]
    fn test_run_all_samples() {
        let mut interp = interpreter();
        let mut panel = RecordingPanel::default();
        let dataset = dataset();

        let mut runner = Runner::new(&mut interp, &mut panel, LAYOUT, FaultPolicy::Continue);
        assert_eq!(runner.stage(), Stage::Idle);
        let report = runner.run(&dataset).unwrap();
        assert_eq!(runner.stage(), Stage::Done);

        assert_eq!(report.outcomes.len(), 10);
        assert_eq!(report.faults, 0);
        for outcome in &report.outcomes {
            let predicted = outcome.predicted.unwrap();
            assert!(predicted < 10);
            let score = outcome.score.unwrap();
            assert_eq!(outcome.confidence, Some(rounded_confidence(score)));
        }
        assert_eq!(interp.invocations(), 10);

        // One init, then text, text, image per sample.
        assert_eq!(panel.calls.len(), 1 + 3 * 10);
        assert_eq!(panel.calls[0], Call::Init);
    }

    #[test]
    fn test_first_sample_display_sequence() {
        let mut interp = interpreter();
        let mut panel = RecordingPanel::default();
        let dataset = dataset();

        let report = Runner::new(&mut interp, &mut panel, LAYOUT, FaultPolicy::Continue)
            .run(&dataset)
            .unwrap();

        let first = &report.outcomes[0];
        assert_eq!(first.truth, 0);
        assert_eq!(first.truth_label, Some("Plane"));

        let label = first.predicted_label.unwrap();
        let score = first.score.unwrap();
        assert_eq!(
            panel.calls[1],
            Call::Text(8, format!("  Prediction: {label}       "))
        );
        assert_eq!(panel.calls[2], Call::Text(9, confidence_text(score)));
        match &panel.calls[3] {
            Call::Image(32, 32, pixels, 300, 100) => {
                assert_eq!(pixels.len(), 3072);
                assert_eq!(&pixels[..3], &[0, 255, 0]);
            }
            other => panic!("expected image blit, got {other:?}"),
        }
    }

    #[test]
    fn test_prediction_matches_output_scores() {
        let mut interp = interpreter();
        let mut panel = RecordingPanel::default();
        let dataset = dataset();

        let report = Runner::new(&mut interp, &mut panel, LAYOUT, FaultPolicy::Continue)
            .run(&dataset)
            .unwrap();

        // The interpreter still holds the last sample's scores.
        let scores = interp.output().unwrap().to_vec();
        let last = report.outcomes.last().unwrap();
        assert_eq!(last.predicted, top_prediction(&scores));
        assert_eq!(last.score, Some(scores[last.predicted.unwrap()]));
    }

    #[test]
    fn test_pause_per_image_on_lcd_panel() {
        let mut interp = interpreter();
        let mut panel = LcdPanel::new(PanelSettings::default(), RecordingDelay::default());
        let dataset = dataset();

        Runner::new(&mut interp, &mut panel, LAYOUT, FaultPolicy::Continue)
            .run(&dataset)
            .unwrap();

        assert_eq!(panel.delay().pauses, vec![5000; 10]);

        // Last sample: label 9, planes filled with (180, 75, 63).
        let pixel = panel.framebuffer().get_pixel(300, 100).unwrap();
        assert_eq!(pixel, 0xFFB4_4B3F);
        let corner = panel.framebuffer().get_pixel(331, 131).unwrap();
        assert_eq!(corner, 0xFFB4_4B3F);
        assert_eq!(panel.framebuffer().get_pixel(332, 100), Some(0xFFFF_FFFF));
    }

    #[test]
    fn test_schema_mismatch_policy() {
        let bytes = model_bytes(SCHEMA_VERSION + 1);
        let device = Default::default();

        let tolerated = prepare_interpreter::<CpuBackend>(
            &bytes,
            DEFAULT_ARENA_SIZE,
            FaultPolicy::Continue,
            &device,
        );
        assert!(tolerated.is_ok());

        let aborted =
            prepare_interpreter::<CpuBackend>(&bytes, DEFAULT_ARENA_SIZE, FaultPolicy::Abort, &device);
        let message = format!("{:#}", aborted.err().unwrap());
        assert!(message.contains("schema version 4"), "{message}");
    }

    #[test]
    fn test_input_type_policy() {
        let bytes = export_with(ModelHeader {
            input_type: ElementType::Float32,
            ..ModelHeader::cifar10()
        });
        // Float inputs need a bigger plan than the default arena.
        let arena = 256 * 1024;
        let device = Default::default();

        let tolerated =
            prepare_interpreter::<CpuBackend>(&bytes, arena, FaultPolicy::Continue, &device);
        assert!(tolerated.is_ok());

        let aborted = prepare_interpreter::<CpuBackend>(&bytes, arena, FaultPolicy::Abort, &device);
        let message = format!("{:#}", aborted.err().unwrap());
        assert!(message.contains("Wrong input type"), "{message}");
    }

    #[test]
    fn test_float_output_model() {
        let bytes = export_with(ModelHeader {
            output_type: ElementType::Float32,
            ..ModelHeader::cifar10()
        });
        let device = Default::default();

        let aborted = prepare_interpreter::<CpuBackend>(
            &bytes,
            DEFAULT_ARENA_SIZE,
            FaultPolicy::Abort,
            &device,
        );
        let message = format!("{:#}", aborted.err().unwrap());
        assert!(message.contains("Wrong output type"), "{message}");

        // Tolerated: scores are decoded back to 0-255 per class.
        let mut interp = prepare_interpreter::<CpuBackend>(
            &bytes,
            DEFAULT_ARENA_SIZE,
            FaultPolicy::Continue,
            &device,
        )
        .unwrap();
        let mut panel = RecordingPanel::default();
        let report = Runner::new(&mut interp, &mut panel, LAYOUT, FaultPolicy::Continue)
            .run(&dataset())
            .unwrap();

        assert_eq!(report.faults, 0);
        for outcome in &report.outcomes {
            assert!(outcome.predicted.unwrap() < 10);
            assert!(outcome.predicted_label.is_some());
        }
        let scores = interp.scores().unwrap();
        let last = report.outcomes.last().unwrap();
        assert_eq!(last.predicted, top_prediction(&scores));
    }

    #[test]
    fn test_failed_invoke_continues() {
        let mut interp = failing_interpreter();
        let mut panel = RecordingPanel::default();

        let report = Runner::new(&mut interp, &mut panel, LAYOUT, FaultPolicy::Continue)
            .run(&dataset())
            .unwrap();

        assert_eq!(report.outcomes.len(), 10);
        assert_eq!(report.faults, 10);
        assert_eq!(report.correct, 0);
        for outcome in &report.outcomes {
            assert!(outcome.predicted.is_none());
            let fault = outcome.fault.as_deref().unwrap();
            assert!(fault.contains("Invoke failed"), "{fault}");
        }
        // Nothing is drawn for a failed sample.
        assert_eq!(panel.calls, vec![Call::Init]);
        assert_eq!(interp.invocations(), 0);
    }

    #[test]
    fn test_failed_invoke_aborts() {
        let mut interp = failing_interpreter();
        let mut panel = RecordingPanel::default();

        let mut runner = Runner::new(&mut interp, &mut panel, LAYOUT, FaultPolicy::Abort);
        let message = format!("{:#}", runner.run(&dataset()).unwrap_err());
        assert!(message.contains("Invoke failed"), "{message}");
        assert_eq!(runner.stage(), Stage::Infer);
        assert_eq!(panel.calls, vec![Call::Init]);
    }

    #[test]
    fn test_arena_overflow_is_fatal() {
        let bytes = model_bytes(SCHEMA_VERSION);
        let result = prepare_interpreter::<CpuBackend>(
            &bytes,
            1024,
            FaultPolicy::Continue,
            &Default::default(),
        );
        let message = format!("{:#}", result.err().unwrap());
        assert!(message.contains("Arena too small"), "{message}");
    }

    #[test]
    fn test_report_accuracy() {
        let sample_outcome = |truth: u8, predicted: Option<usize>| Outcome {
            index: 0,
            truth,
            truth_label: label_name(truth as usize),
            predicted,
            predicted_label: predicted.and_then(label_name),
            score: None,
            confidence: None,
            fault: None,
        };
        let report = RunReport::new(vec![
            sample_outcome(1, Some(1)),
            sample_outcome(2, Some(3)),
            sample_outcome(4, None),
            sample_outcome(5, Some(5)),
        ]);
        assert_eq!(report.correct, 2);
        assert_eq!(report.accuracy(), 0.5);
        assert_eq!(RunReport::new(Vec::new()).accuracy(), 0.0);
    }
}
