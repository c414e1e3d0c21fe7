use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{Conv2d, Conv2dConfig, Linear, Module, VarBuilder};
use image::DynamicImage;
use ndarray::Array1;

use crate::error::Result;

/// Input images are resized to this edge length before encoding.
pub const INPUT_SIZE: usize = 150;
/// Dimension of the embedding vectors produced by the encoder.
pub const EMBEDDING_DIM: usize = 128;

// Two stride-2 poolings from 150: 150 -> 75 -> 37 (floor division),
// so the flattened feature map entering the first fully-connected
// layer is 128 channels * 37 * 37.
const FC_INPUT: usize = 128 * 37 * 37;

/// Single-branch forward path of a trained siamese convolutional encoder.
///
/// The twin-branch structure only matters during training; at serving time the
/// encoder maps one RGB image to one 128-dimensional embedding. Weights are
/// loaded from a safetensors export of the original checkpoint, and every
/// layer constructor validates the stored tensor shapes, so a mismatched
/// artifact fails at startup rather than at request time.
#[derive(Debug)]
pub struct SiameseEncoder {
    conv1: Conv2d,
    conv2: Conv2d,
    fc1: Linear,
    fc2: Linear,
    fc3: Linear,
    device: Device,
}

impl SiameseEncoder {
    /// Load encoder weights from a safetensors file.
    ///
    /// Runs on CUDA when compiled with CUDA support and a device is present,
    /// otherwise on the CPU.
    pub fn load<P: AsRef<Path>>(weights_path: P) -> Result<Self> {
        let device = Device::cuda_if_available(0)?;
        let data = std::fs::read(weights_path.as_ref())?;
        let vb = VarBuilder::from_buffered_safetensors(data, DType::F32, &device)?;
        Self::from_var_builder(vb, device)
    }

    /// Build the encoder from an existing variable source.
    ///
    /// Parameter names follow the original checkpoint's `state_dict` layout
    /// (`cnn.0`, `cnn.3`, `fc.0`, `fc.2`, `fc.4`).
    pub fn from_var_builder(vb: VarBuilder<'_>, device: Device) -> Result<Self> {
        let conv_cfg = Conv2dConfig {
            padding: 2,
            ..Default::default()
        };

        let conv1 = candle_nn::conv2d(3, 64, 5, conv_cfg, vb.pp("cnn.0"))?;
        let conv2 = candle_nn::conv2d(64, 128, 5, conv_cfg, vb.pp("cnn.3"))?;
        let fc1 = candle_nn::linear(FC_INPUT, 512, vb.pp("fc.0"))?;
        let fc2 = candle_nn::linear(512, 256, vb.pp("fc.2"))?;
        let fc3 = candle_nn::linear(256, EMBEDDING_DIM, vb.pp("fc.4"))?;

        Ok(Self {
            conv1,
            conv2,
            fc1,
            fc2,
            fc3,
            device,
        })
    }

    /// Compute the embedding for an image.
    ///
    /// Preprocessing is identical for reference indexing and queries: resize
    /// to 150x150, RGB channels scaled to [0, 1], CHW layout, no further
    /// normalization. Distances between embeddings are only meaningful
    /// because both sides go through this exact pipeline.
    pub fn embed(&self, img: &DynamicImage) -> Result<Array1<f32>> {
        let input = self.preprocess(img)?;
        let output = self.forward(&input)?;
        let embedding: Vec<f32> = output.squeeze(0)?.to_vec1()?;

        Ok(Array1::from(embedding))
    }

    /// Convert an image into a `[1, 3, 150, 150]` float tensor.
    fn preprocess(&self, img: &DynamicImage) -> Result<Tensor> {
        let resized = img.resize_exact(
            INPUT_SIZE as u32,
            INPUT_SIZE as u32,
            image::imageops::FilterType::Triangle,
        );
        let rgb = resized.to_rgb8();

        // Interleaved RGB -> channel planes, scaled to [0, 1].
        let plane = INPUT_SIZE * INPUT_SIZE;
        let mut data = vec![0f32; 3 * plane];
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let idx = y as usize * INPUT_SIZE + x as usize;
            data[idx] = pixel[0] as f32 / 255.0;
            data[plane + idx] = pixel[1] as f32 / 255.0;
            data[2 * plane + idx] = pixel[2] as f32 / 255.0;
        }

        let tensor = Tensor::from_vec(data, (1, 3, INPUT_SIZE, INPUT_SIZE), &self.device)?;
        Ok(tensor)
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let x = self.conv1.forward(input)?.relu()?.max_pool2d(2)?;
        let x = self.conv2.forward(&x)?.relu()?.max_pool2d(2)?;
        let x = x.flatten_from(1)?;
        let x = self.fc1.forward(&x)?.relu()?;
        let x = self.fc2.forward(&x)?.relu()?;
        let x = self.fc3.forward(&x)?;
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_util::{gradient_image, test_encoder};

    #[test]
    fn embedding_has_expected_dimension() {
        let embedding = test_encoder().embed(&gradient_image(64, 48, 128)).unwrap();
        assert_eq!(embedding.len(), EMBEDDING_DIM);
        assert!(embedding.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn embedding_is_deterministic() {
        let img = gradient_image(32, 32, 200);
        let encoder = test_encoder();
        let a = encoder.embed(&img).unwrap();
        let b = encoder.embed(&img).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn accepts_any_source_resolution() {
        // The resize step fixes the spatial size, so the forward pass (and
        // the 128*37*37 fully-connected input) must line up for any input.
        let encoder = test_encoder();
        for (w, h) in [(150, 150), (640, 480), (31, 97)] {
            let embedding = encoder.embed(&gradient_image(w, h, 64)).unwrap();
            assert_eq!(embedding.len(), EMBEDDING_DIM);
        }
    }
}
