use std::path::Path;

use ndarray::{Array2, Array4, Axis};
use ort::{self, inputs, CPUExecutionProvider, GraphOptimizationLevel};

use crate::image_features::ImageEncoder;
use crate::preprocessing::FEATURE_VECTOR_LENGTH;

/// ResNet50 pretrained on ImageNet, without the final classification layer and with
/// global average pooling, so each image maps to a 2048-dimensional feature vector.
///
/// Uses an ONNX export of the Keras model so it can be run from Rust with the ONNX runtime.
/// The model takes a single NHWC input, preprocessed with `preprocessing::load_image()`.
pub struct ResNet50
{
    session: ort::Session,
}

impl ResNet50
{
    pub fn new(model_path: &Path) -> Result<Self, ort::Error>
    {
        let session = ort::Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .with_execution_providers([CPUExecutionProvider::default().build()])?
            .commit_from_file(model_path)?;

        Ok( ResNet50 { session } )
    }
}

impl ImageEncoder for ResNet50
{
    fn feature_width(&self) -> usize
    {
        FEATURE_VECTOR_LENGTH
    }

    /// Returns a 2D array of shape (batch_size, FEATURE_VECTOR_LENGTH).
    fn encode_image(&self, images: Array4<f32>) -> anyhow::Result<Array2<f32>>
    {
        let images_len = images.len_of(Axis(0));
        let outputs = self.session.run(inputs![images]?)?;

        // The pooled features are the model's only output.
        let output = outputs[0].try_extract_tensor::<f32>()?;

        let output = output.to_shape((images_len, FEATURE_VECTOR_LENGTH))?.to_owned();

        Ok(output)
    }
}
