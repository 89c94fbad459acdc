//! CIFAR-10 convolutional classifier.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Tensor},
};

/// Number of 2x2 pooling stages; each halves the spatial size.
const POOL_STAGES: u32 = 3;

#[derive(Config, Debug)]
pub struct CifarNetConfig {
    #[config(default = 32)]
    pub image_size: usize,
    #[config(default = 3)]
    pub channels: usize,
    #[config(default = 10)]
    pub num_classes: usize,
    #[config(default = 16)]
    pub conv1_channels: usize,
    #[config(default = 32)]
    pub conv2_channels: usize,
    #[config(default = 32)]
    pub conv3_channels: usize,
    #[config(default = 64)]
    pub hidden_size: usize,
}

/// Three conv/relu/pool stages followed by two dense layers.
#[derive(Module, Debug)]
pub struct CifarNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl CifarNetConfig {
    /// Spatial side length after the last pooling stage.
    pub fn pooled_size(&self) -> usize {
        self.image_size >> POOL_STAGES
    }

    /// Returns true when the image size survives every pooling stage evenly.
    pub fn is_valid(&self) -> bool {
        self.image_size > 0 && self.image_size % (1 << POOL_STAGES) == 0
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> CifarNet<B> {
        let conv = |from: usize, to: usize| {
            Conv2dConfig::new([from, to], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .init(device)
        };
        let flattened = self.conv3_channels * self.pooled_size() * self.pooled_size();

        CifarNet {
            conv1: conv(self.channels, self.conv1_channels),
            conv2: conv(self.conv1_channels, self.conv2_channels),
            conv3: conv(self.conv2_channels, self.conv3_channels),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            fc1: LinearConfig::new(flattened, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }

    /// Element counts `(input, output)` of every layer, in execution order.
    ///
    /// The arena planner sizes activation scratch from the largest pair.
    pub fn layer_footprints(&self) -> Vec<(usize, usize)> {
        let mut footprints = Vec::new();
        let mut side = self.image_size;
        let mut channels = self.channels;

        for out_channels in [self.conv1_channels, self.conv2_channels, self.conv3_channels] {
            let plane = side * side;
            footprints.push((plane * channels, plane * out_channels));
            side /= 2;
            footprints.push((plane * out_channels, side * side * out_channels));
            channels = out_channels;
        }

        let flattened = side * side * channels;
        footprints.push((flattened, self.hidden_size));
        footprints.push((self.hidden_size, self.num_classes));
        footprints
    }
}

impl<B: Backend> CifarNet<B> {
    /// Computes class logits.
    ///
    /// # Shapes
    ///   - Images [batch_size, channels, height, width]
    ///   - Output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.pool.forward(self.activation.forward(self.conv1.forward(images)));
        let x = self.pool.forward(self.activation.forward(self.conv2.forward(x)));
        let x = self.pool.forward(self.activation.forward(self.conv3.forward(x)));

        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.activation.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    /// Computes class probabilities.
    pub fn predict(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }
}
