use crate::{
    config::{ModelConfig, Validatable},
    error::{ModelLoadError, PredictionError},
    model_service::ModelService,
    preprocessing::{INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH},
};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::{TensorRef, ValueType},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

const DYNAMIC_DIM: i64 = -1;

/// `-1` on either side matches any size.
fn dims_compatible(expected: &[i64], actual: &[i64]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .all(|(e, a)| *e == DYNAMIC_DIM || *a == DYNAMIC_DIM || e == a)
}

fn tensor_dims(value_type: &ValueType) -> Option<Vec<i64>> {
    match value_type {
        ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

/// Input and output layout of an exported classifier graph.
#[derive(Debug, Clone, PartialEq)]
struct ModelSignature {
    output_name: String,
    num_classes: usize,
}

/// Name and tensor dimensions of a graph input or output; `None` for non-tensor values.
struct Port {
    name: String,
    dims: Option<Vec<i64>>,
}

impl ModelSignature {
    fn from_session(session: &Session) -> Result<Self, ModelLoadError> {
        let inputs: Vec<Port> = session
            .inputs
            .iter()
            .map(|input| Port {
                name: input.name.clone(),
                dims: tensor_dims(&input.input_type),
            })
            .collect();
        let outputs: Vec<Port> = session
            .outputs
            .iter()
            .map(|output| Port {
                name: output.name.clone(),
                dims: tensor_dims(&output.output_type),
            })
            .collect();

        Self::from_ports(&inputs, &outputs)
    }

    fn from_ports(inputs: &[Port], outputs: &[Port]) -> Result<Self, ModelLoadError> {
        let (input, output) = match (inputs, outputs) {
            ([input], [output]) => (input, output),
            _ => {
                return Err(ModelLoadError::Arity {
                    inputs: inputs.len(),
                    outputs: outputs.len(),
                })
            }
        };

        let input_dims = input
            .dims
            .as_deref()
            .ok_or_else(|| ModelLoadError::NotTensor("input", input.name.clone()))?;
        let output_dims = output
            .dims
            .as_deref()
            .ok_or_else(|| ModelLoadError::NotTensor("output", output.name.clone()))?;

        Self::validate(&output.name, input_dims, output_dims)
    }

    fn validate(
        output_name: &str,
        input_dims: &[i64],
        output_dims: &[i64],
    ) -> Result<Self, ModelLoadError> {
        let expected_input = [
            1,
            INPUT_CHANNELS as i64,
            INPUT_HEIGHT as i64,
            INPUT_WIDTH as i64,
        ];
        if !dims_compatible(&expected_input, input_dims) {
            return Err(ModelLoadError::IncompatibleShape {
                kind: "input",
                expected: expected_input.to_vec(),
                actual: input_dims.to_vec(),
            });
        }

        let num_classes = match output_dims {
            [batch, classes] if (*batch == 1 || *batch == DYNAMIC_DIM) && *classes > 0 => {
                *classes as usize
            }
            _ => {
                return Err(ModelLoadError::IncompatibleShape {
                    kind: "output",
                    expected: vec![1, DYNAMIC_DIM],
                    actual: output_dims.to_vec(),
                })
            }
        };

        Ok(Self {
            output_name: output_name.to_string(),
            num_classes,
        })
    }
}

/// ONNX Runtime classifier. Holds a small pool of sessions built from the same
/// weight file and hands requests to them round-robin.
#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Mutex<Session>>>,
    counter: Arc<AtomicUsize>,
    signature: Arc<ModelSignature>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, ModelLoadError> {
        let model_path = model_config.get_path();
        if !model_path.exists() {
            return Err(ModelLoadError::MissingFile(model_path));
        }

        ort::init().with_name("discus_prediction").commit()?;

        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let mut builder =
                    Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
                if let Some(threads) = model_config.intra_threads {
                    builder = builder.with_intra_threads(threads)?;
                }
                builder.commit_from_file(&model_path)
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        let signature = ModelSignature::from_session(&sessions[0])?;

        tracing::info!(
            "Loaded {:?} into {} ONNX sessions, {} classes",
            model_path,
            num_instances,
            signature.num_classes
        );

        Ok(Self {
            sessions: Arc::new(sessions.into_iter().map(Mutex::new).collect()),
            counter: Arc::new(AtomicUsize::new(0)),
            signature: Arc::new(signature),
        })
    }
}

impl ModelService for OrtModelService {
    fn num_classes(&self) -> usize {
        self.signature.num_classes
    }

    fn infer(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, PredictionError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| PredictionError::Inference(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let input = input.as_standard_layout();
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| PredictionError::Inference(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| PredictionError::Inference(e.to_string()))?;

        let (_, scores) = outputs[self.signature.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| PredictionError::Inference(format!("failed to extract tensor: {}", e)))?;

        Ok(scores.to_vec())
    }
}
