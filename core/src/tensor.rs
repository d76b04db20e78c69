//! Host-side tensors exchanged with the ML runtime.
//!
//! Tensors keep their logical shape and element type so generation inputs can
//! be sent back to the runtime unchanged. Audio normalization only ever needs
//! `flatten_f32`.
//!
//! Wire form (JSON): `{"dtype": "float32", "shape": [1, 480], "data": "<base64>",
//! "placement": "host"}` where `data` holds little-endian element bytes.

use crate::{CompatError, Result};
use base64::{engine::general_purpose, Engine as _};
use ndarray::{ArrayD, Axis, IxDyn};
use serde::{Deserialize, Serialize};

/// Where the runtime should keep a tensor when it is used as an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    #[default]
    Host,
    Device,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I64(ArrayD<i64>),
    I32(ArrayD<i32>),
    Bool(ArrayD<bool>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireTensor", into = "WireTensor")]
pub struct Tensor {
    data: TensorData,
    placement: Placement,
}

impl Tensor {
    pub fn new(data: TensorData) -> Self {
        Self {
            data,
            placement: Placement::Host,
        }
    }

    pub fn from_f32(shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        let arr = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| CompatError::Protocol(format!("tensor shape mismatch: {}", e)))?;
        Ok(Self::new(TensorData::F32(arr)))
    }

    pub fn from_i64(shape: Vec<usize>, values: Vec<i64>) -> Result<Self> {
        let arr = ArrayD::from_shape_vec(IxDyn(&shape), values)
            .map_err(|e| CompatError::Protocol(format!("tensor shape mismatch: {}", e)))?;
        Ok(Self::new(TensorData::I64(arr)))
    }

    /// `[1, n]` float tensor built from a flat sample buffer.
    pub fn batched_f32(values: Vec<f32>) -> Self {
        let arr = ndarray::Array1::from(values)
            .insert_axis(Axis(0))
            .into_dyn();
        Self::new(TensorData::F32(arr))
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn placed(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn shape(&self) -> &[usize] {
        match &self.data {
            TensorData::F32(a) => a.shape(),
            TensorData::F64(a) => a.shape(),
            TensorData::I64(a) => a.shape(),
            TensorData::I32(a) => a.shape(),
            TensorData::Bool(a) => a.shape(),
        }
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match &self.data {
            TensorData::F32(_) => "float32",
            TensorData::F64(_) => "float64",
            TensorData::I64(_) => "int64",
            TensorData::I32(_) => "int32",
            TensorData::Bool(_) => "bool",
        }
    }

    /// Flatten to one dimension in row-major order, casting to f32.
    pub fn flatten_f32(&self) -> Vec<f32> {
        match &self.data {
            TensorData::F32(a) => a.iter().copied().collect(),
            TensorData::F64(a) => a.iter().map(|v| *v as f32).collect(),
            TensorData::I64(a) => a.iter().map(|v| *v as f32).collect(),
            TensorData::I32(a) => a.iter().map(|v| *v as f32).collect(),
            TensorData::Bool(a) => a.iter().map(|v| if *v { 1.0 } else { 0.0 }).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTensor {
    pub dtype: String,
    pub shape: Vec<usize>,
    pub data: String,
    #[serde(default)]
    pub placement: Placement,
}

impl From<Tensor> for WireTensor {
    fn from(t: Tensor) -> Self {
        let shape = t.shape().to_vec();
        let dtype = t.dtype().to_string();
        let bytes: Vec<u8> = match &t.data {
            TensorData::F32(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
            TensorData::F64(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
            TensorData::I64(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
            TensorData::I32(a) => a.iter().flat_map(|v| v.to_le_bytes()).collect(),
            TensorData::Bool(a) => a.iter().map(|v| *v as u8).collect(),
        };
        Self {
            dtype,
            shape,
            data: general_purpose::STANDARD.encode(bytes),
            placement: t.placement,
        }
    }
}

impl TryFrom<WireTensor> for Tensor {
    type Error = CompatError;

    fn try_from(w: WireTensor) -> Result<Self> {
        let bytes = general_purpose::STANDARD
            .decode(w.data.as_bytes())
            .map_err(|e| CompatError::Protocol(format!("invalid tensor payload: {}", e)))?;
        let shape = IxDyn(&w.shape);
        let shape_err = |e: ndarray::ShapeError| {
            CompatError::Protocol(format!("tensor shape mismatch for {:?}: {}", w.shape, e))
        };
        let data = match w.dtype.as_str() {
            "float32" => TensorData::F32(
                ArrayD::from_shape_vec(shape, decode_le(&bytes, f32::from_le_bytes)?)
                    .map_err(shape_err)?,
            ),
            "float64" => TensorData::F64(
                ArrayD::from_shape_vec(shape, decode_le(&bytes, f64::from_le_bytes)?)
                    .map_err(shape_err)?,
            ),
            "int64" => TensorData::I64(
                ArrayD::from_shape_vec(shape, decode_le(&bytes, i64::from_le_bytes)?)
                    .map_err(shape_err)?,
            ),
            "int32" => TensorData::I32(
                ArrayD::from_shape_vec(shape, decode_le(&bytes, i32::from_le_bytes)?)
                    .map_err(shape_err)?,
            ),
            "bool" => TensorData::Bool(
                ArrayD::from_shape_vec(shape, bytes.iter().map(|b| *b != 0).collect())
                    .map_err(shape_err)?,
            ),
            other => {
                return Err(CompatError::Protocol(format!(
                    "unsupported tensor dtype: {}",
                    other
                )))
            }
        };
        Ok(Self {
            data,
            placement: w.placement,
        })
    }
}

fn decode_le<T, const N: usize>(bytes: &[u8], f: fn([u8; N]) -> T) -> Result<Vec<T>> {
    if bytes.len() % N != 0 {
        return Err(CompatError::Protocol(format!(
            "tensor payload length {} is not a multiple of {}",
            bytes.len(),
            N
        )));
    }
    Ok(bytes
        .chunks_exact(N)
        .map(|c| {
            let mut buf = [0u8; N];
            buf.copy_from_slice(c);
            f(buf)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_is_row_major_and_cast() {
        let t = Tensor::from_i64(vec![2, 2], vec![1, 2, 3, 4]).unwrap();
        assert_eq!(t.flatten_f32(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(t.dtype(), "int64");
    }

    #[test]
    fn wire_form_keeps_dtype_shape_and_placement() {
        let t = Tensor::from_f32(vec![1, 3], vec![0.25, -0.5, 1.0])
            .unwrap()
            .placed(Placement::Device);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["dtype"], "float32");
        assert_eq!(json["placement"], "device");
        let back: Tensor = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let wire = WireTensor {
            dtype: "float32".into(),
            shape: vec![1],
            data: general_purpose::STANDARD.encode([0u8, 1, 2]),
            placement: Placement::Host,
        };
        assert!(Tensor::try_from(wire).is_err());
    }
}
