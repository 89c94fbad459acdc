//! Model interpreter: arena planning, input staging, invocation and output.

use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor, TensorData},
};
use tracing::{debug, info};

use crate::arena::{ArenaPlan, TensorArena};
use crate::model::{ElementType, Model, ModelHeader};
use crate::network::{CifarNet, CifarNetConfig};
use crate::{Error, Result};

/// Runs one model against one arena.
///
/// Call [`Interpreter::allocate_tensors`] once, then repeat
/// `set_input` / `invoke` / `output` per image.
pub struct Interpreter<B: Backend> {
    header: ModelHeader,
    config: CifarNetConfig,
    network: CifarNet<B>,
    device: B::Device,
    arena: TensorArena,
    plan: Option<ArenaPlan>,
    invocations: u64,
}

impl<B: Backend> Interpreter<B> {
    /// Builds an interpreter from a parsed model, decoding its weights.
    pub fn new(model: &Model, arena: TensorArena, device: &B::Device) -> Result<Self> {
        let config = network_config(model.header())?;

        let record = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load(model.weights().to_vec(), device)
            .map_err(|e| Error::Record(format!("{e:?}")))?;
        let network = config.init::<B>(device).load_record(record);

        info!(
            "Model loaded: {}x{}x{} {} input, {} classes",
            model.header().input_height,
            model.header().input_width,
            model.header().input_channels,
            model.header().input_type,
            model.header().num_classes
        );

        Ok(Self::with_network(
            model.header().clone(),
            config,
            network,
            arena,
            device,
        ))
    }

    /// Builds an interpreter around an in-memory network.
    pub fn from_network(
        header: ModelHeader,
        network: CifarNet<B>,
        arena: TensorArena,
        device: &B::Device,
    ) -> Result<Self> {
        let config = network_config(&header)?;
        Ok(Self::with_network(header, config, network, arena, device))
    }

    fn with_network(
        header: ModelHeader,
        config: CifarNetConfig,
        network: CifarNet<B>,
        arena: TensorArena,
        device: &B::Device,
    ) -> Self {
        Self {
            header,
            config,
            network,
            device: device.clone(),
            arena,
            plan: None,
            invocations: 0,
        }
    }

    pub fn header(&self) -> &ModelHeader {
        &self.header
    }

    /// Declared element type of the input tensor.
    pub fn input_type(&self) -> ElementType {
        self.header.input_type
    }

    /// Checks that the input tensor takes raw uint8 pixels.
    pub fn check_input_type(&self) -> Result<()> {
        if self.header.input_type != ElementType::UInt8 {
            return Err(Error::InputType {
                expected: ElementType::UInt8,
                found: self.header.input_type,
            });
        }
        Ok(())
    }

    /// Checks that the output tensor holds uint8 scores.
    pub fn check_output_type(&self) -> Result<()> {
        if self.header.output_type != ElementType::UInt8 {
            return Err(Error::OutputType {
                expected: ElementType::UInt8,
                found: self.header.output_type,
            });
        }
        Ok(())
    }

    /// Plans the input, output and scratch budget inside the arena.
    ///
    /// The scratch range only accounts for the peak activation footprint;
    /// the runtime keeps activations in its own tensors. Fails with
    /// [`Error::ArenaTooSmall`] when the plan does not fit.
    pub fn allocate_tensors(&mut self) -> Result<&ArenaPlan> {
        let width = self.header.input_type.size();
        let peak = self
            .config
            .layer_footprints()
            .into_iter()
            .map(|(input, output)| (input + output) * width)
            .max()
            .unwrap_or(0);

        let plan = ArenaPlan::new(
            self.header.input_bytes(),
            self.header.output_bytes(),
            peak,
            self.arena.len(),
        )?;
        info!(
            "Arena planned: {} of {} bytes used",
            plan.required(),
            self.arena.len()
        );

        Ok(self.plan.insert(plan))
    }

    fn plan(&self) -> Result<ArenaPlan> {
        self.plan.clone().ok_or(Error::NotAllocated)
    }

    /// Returns the input tensor bytes.
    pub fn input(&self) -> Result<&[u8]> {
        let plan = self.plan()?;
        Ok(self.arena.region(plan.input))
    }

    /// Copies one image into the input tensor.
    ///
    /// `data` must be exactly the input tensor size.
    pub fn set_input(&mut self, data: &[u8]) -> Result<()> {
        let plan = self.plan()?;
        let input = self.arena.region_mut(plan.input);
        if data.len() != input.len() {
            return Err(Error::InputSize {
                expected: input.len(),
                actual: data.len(),
            });
        }

        input.copy_from_slice(data);
        Ok(())
    }

    /// Runs the model on the current input and writes quantized scores to
    /// the output tensor.
    pub fn invoke(&mut self) -> Result<()> {
        let plan = self.plan()?;
        let header = &self.header;
        let shape = [
            1,
            header.input_height as usize,
            header.input_width as usize,
            header.input_channels as usize,
        ];

        let values = decode_input(header.input_type, self.arena.region(plan.input.clone()));
        let data = TensorData::new(values, [header.input_elements()]);
        let images = Tensor::<B, 1>::from_data(data, &self.device)
            .reshape(shape)
            .permute([0, 3, 1, 2]);

        let probs = self
            .network
            .predict(images)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| Error::Invoke(format!("{e:?}")))?;

        if probs.len() != header.num_classes as usize {
            return Err(Error::Invoke(format!(
                "expected {} scores, runtime produced {}",
                header.num_classes,
                probs.len()
            )));
        }
        if probs.iter().any(|p| !p.is_finite()) {
            return Err(Error::Invoke("non-finite class score".to_string()));
        }

        let output_type = header.output_type;
        encode_output(output_type, &probs, self.arena.region_mut(plan.output));

        self.invocations += 1;
        debug!("Invocation {} complete", self.invocations);
        Ok(())
    }

    /// Returns the output tensor bytes.
    pub fn output(&self) -> Result<&[u8]> {
        let plan = self.plan()?;
        Ok(self.arena.region(plan.output))
    }

    /// Output scores on the 0-255 scale, one per class, whatever the
    /// output element type.
    pub fn scores(&self) -> Result<Vec<u8>> {
        let output = self.output()?;
        let scores = match self.header.output_type {
            ElementType::UInt8 => output.to_vec(),
            ElementType::Int8 => output
                .iter()
                .map(|&b| (b as i8 as i16 + 128) as u8)
                .collect(),
            ElementType::Float32 => output
                .chunks_exact(4)
                .map(|c| quantize(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        };
        Ok(scores)
    }

    /// Number of successful invocations so far.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }
}

/// Derives the network shape from a header.
fn network_config(header: &ModelHeader) -> Result<CifarNetConfig> {
    if header.input_height != header.input_width {
        return Err(Error::UnsupportedShape(format!(
            "non-square input {}x{}",
            header.input_height, header.input_width
        )));
    }
    if header.num_classes == 0 {
        return Err(Error::UnsupportedShape("zero classes".to_string()));
    }

    let config = CifarNetConfig::new()
        .with_image_size(header.input_height as usize)
        .with_channels(header.input_channels as usize)
        .with_num_classes(header.num_classes as usize);
    if !config.is_valid() {
        return Err(Error::UnsupportedShape(format!(
            "input size {} is not a multiple of 8",
            header.input_height
        )));
    }
    Ok(config)
}

/// Converts raw input bytes to normalized floats.
fn decode_input(element_type: ElementType, bytes: &[u8]) -> Vec<f32> {
    match element_type {
        ElementType::UInt8 => bytes.iter().map(|&b| b as f32 / 255.0).collect(),
        ElementType::Int8 => bytes
            .iter()
            .map(|&b| (b as i8 as f32 + 128.0) / 255.0)
            .collect(),
        ElementType::Float32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    }
}

/// Quantizes probabilities into the output tensor.
fn encode_output(element_type: ElementType, probs: &[f32], out: &mut [u8]) {
    match element_type {
        ElementType::UInt8 => {
            for (slot, p) in out.iter_mut().zip(probs) {
                *slot = quantize(*p);
            }
        }
        ElementType::Int8 => {
            for (slot, p) in out.iter_mut().zip(probs) {
                *slot = (quantize(*p) as i16 - 128) as i8 as u8;
            }
        }
        ElementType::Float32 => {
            for (slot, p) in out.chunks_exact_mut(4).zip(probs) {
                slot.copy_from_slice(&p.to_le_bytes());
            }
        }
    }
}

/// Maps a probability in [0, 1] to a 0-255 score.
pub fn quantize(p: f32) -> u8 {
    (p.clamp(0.0, 1.0) * 255.0).round() as u8
}
