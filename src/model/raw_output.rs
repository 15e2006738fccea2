// 该文件是 Tanjing （探镜） 项目的一部分。
// src/model/raw_output.rs - SSD 原始输出与解码
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;
use tracing::debug;

use crate::model::{Detection, LabelTable, PixelRect};

/// 参考模型转换时固定的检测槽数
pub const MAX_DETECTION_NUM: usize = 10;

#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
  #[error("类别索引 {class_index} 超出标签表范围 (共 {len} 个标签)，模型与标签文件不匹配")]
  LabelIndexOutOfRange { class_index: f32, len: usize },
  #[error("模型输出形状不匹配: {0}")]
  OutputShapeMismatch(String),
}

/// 一次推理得到的四个并列数组
///
/// 每次推理新建，不在调用之间复用。下标不小于检测数的槽位内容未定义，解码时不会读取。
#[derive(Debug, Clone, PartialEq)]
pub struct RawModelOutput {
  // [top, left, bottom, right]，归一化到 [0, 1]
  boxes: Vec<[f32; 4]>,
  class_indices: Vec<f32>,
  // 按降序排列
  scores: Vec<f32>,
  detection_count: f32,
}

impl RawModelOutput {
  pub fn new(
    boxes: Vec<[f32; 4]>,
    class_indices: Vec<f32>,
    scores: Vec<f32>,
    detection_count: f32,
  ) -> Result<Self, DecodeError> {
    if boxes.len() != scores.len() || class_indices.len() != scores.len() {
      return Err(DecodeError::OutputShapeMismatch(format!(
        "检测框 {} 个, 类别 {} 个, 分数 {} 个",
        boxes.len(),
        class_indices.len(),
        scores.len()
      )));
    }

    Ok(Self {
      boxes,
      class_indices,
      scores,
      detection_count,
    })
  }

  /// 从推理引擎的扁平张量构造：boxes 为 N×4，count 至少一个元素
  pub fn from_flat(
    boxes: &[f32],
    class_indices: &[f32],
    scores: &[f32],
    detection_count: &[f32],
  ) -> Result<Self, DecodeError> {
    if boxes.len() % 4 != 0 {
      return Err(DecodeError::OutputShapeMismatch(format!(
        "检测框张量长度 {} 不是 4 的倍数",
        boxes.len()
      )));
    }
    let count = *detection_count
      .first()
      .ok_or_else(|| DecodeError::OutputShapeMismatch("检测数张量为空".to_string()))?;

    let boxes = boxes
      .chunks_exact(4)
      .map(|c| [c[0], c[1], c[2], c[3]])
      .collect();
    Self::new(boxes, class_indices.to_vec(), scores.to_vec(), count)
  }

  /// 每次推理可容纳的最大检测数
  pub fn capacity(&self) -> usize {
    self.scores.len()
  }

  /// `min(trunc(count), N)`；`as` 转换对负数与 NaN 饱和为 0
  pub fn valid_count(&self) -> usize {
    (self.detection_count as usize).min(self.capacity())
  }

  /// 将原始输出解码为原图像素坐标下的检测结果
  ///
  /// 分数已降序排列，遇到第一个低于阈值的分数即停止，结果只保留前 `max_results` 个。
  pub fn decode(
    &self,
    labels: &LabelTable,
    width: u32,
    height: u32,
    score_threshold: f32,
    max_results: usize,
  ) -> Result<Vec<Detection>, DecodeError> {
    let (w, h) = (width as f32, height as f32);
    let mut detections = Vec::new();

    for i in 0..self.valid_count() {
      let score = self.scores[i];
      // NaN 同样视为低于阈值
      if score.is_nan() || score < score_threshold {
        debug!("第 {} 个检测分数 {:.3} 低于阈值，停止解码", i, score);
        break;
      }

      let raw_class = self.class_indices[i];
      let (class_id, label) = class_index(raw_class)
        .and_then(|idx| labels.get(idx).map(|label| (idx as u32, label)))
        .ok_or(DecodeError::LabelIndexOutOfRange {
          class_index: raw_class,
          len: labels.len(),
        })?;

      let [top, left, bottom, right] = self.boxes[i];
      let bbox = PixelRect {
        left: (left * w) as i32,
        top: (top * h) as i32,
        right: (right * w) as i32,
        bottom: (bottom * h) as i32,
      };

      detections.push(Detection::new(score, label, class_id, bbox));
    }

    detections.truncate(max_results);
    Ok(detections)
  }
}

/// 类别索引以浮点数输出，向下取整；负数或非有限值视为无效
fn class_index(raw: f32) -> Option<usize> {
  let floored = raw.floor();
  (floored.is_finite() && floored >= 0.0).then_some(floored as usize)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn labels() -> LabelTable {
    LabelTable::from_iter(["a", "b", "c", "d", "e"])
  }

  fn output_with_scores(scores: &[f32], count: f32) -> RawModelOutput {
    let n = MAX_DETECTION_NUM;
    let mut padded = scores.to_vec();
    padded.resize(n, 0.0);
    RawModelOutput::new(
      vec![[0.1, 0.2, 0.5, 0.6]; n],
      (0..n).map(|i| (i % 5) as f32).collect(),
      padded,
      count,
    )
    .unwrap()
  }

  fn scores_of(detections: &[Detection]) -> Vec<f32> {
    detections.iter().map(Detection::score).collect()
  }

  #[test]
  fn converts_normalized_box_to_truncated_pixels() {
    let output = output_with_scores(&[0.9], 1.0);
    let detections = output.decode(&labels(), 300, 200, 0.5, 4).unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(
      detections[0].bbox(),
      &PixelRect {
        left: 60,
        top: 20,
        right: 180,
        bottom: 100,
      }
    );
  }

  #[test]
  fn truncates_instead_of_rounding() {
    let output = RawModelOutput::new(vec![[0.0, 0.0, 0.999, 0.999]], vec![0.0], vec![0.9], 1.0)
      .unwrap();
    let detections = output.decode(&labels(), 100, 100, 0.5, 4).unwrap();
    assert_eq!(detections[0].bbox().right, 99);
    assert_eq!(detections[0].bbox().bottom, 99);
  }

  #[test]
  fn resolves_label_by_floored_index() {
    let output =
      RawModelOutput::new(vec![[0.0, 0.0, 1.0, 1.0]], vec![3.7], vec![0.8], 1.0).unwrap();
    let detections = output.decode(&labels(), 10, 10, 0.5, 4).unwrap();
    assert_eq!(detections[0].label(), "d");
    assert_eq!(detections[0].class_id(), 3);
  }

  #[test]
  fn out_of_range_label_is_fatal() {
    let output =
      RawModelOutput::new(vec![[0.0, 0.0, 1.0, 1.0]], vec![5.0], vec![0.8], 1.0).unwrap();
    let err = output.decode(&labels(), 10, 10, 0.5, 4).unwrap_err();
    assert_eq!(
      err,
      DecodeError::LabelIndexOutOfRange {
        class_index: 5.0,
        len: 5
      }
    );

    let negative =
      RawModelOutput::new(vec![[0.0, 0.0, 1.0, 1.0]], vec![-1.0], vec![0.8], 1.0).unwrap();
    assert!(negative.decode(&labels(), 10, 10, 0.5, 4).is_err());
  }

  #[test]
  fn zero_count_yields_nothing() {
    let output = output_with_scores(&[0.9, 0.9, 0.9], 0.0);
    assert!(output.decode(&labels(), 10, 10, 0.5, 4).unwrap().is_empty());
  }

  #[test]
  fn all_below_threshold_yields_nothing() {
    let output = output_with_scores(&[0.49, 0.3, 0.2, 0.1], 4.0);
    assert!(output.decode(&labels(), 10, 10, 0.5, 4).unwrap().is_empty());
  }

  #[test]
  fn stops_at_first_score_below_threshold() {
    let output = output_with_scores(&[0.9, 0.8, 0.6, 0.4, 0.3, 0.1], 6.0);
    let detections = output.decode(&labels(), 300, 300, 0.5, 4).unwrap();
    assert_eq!(scores_of(&detections), vec![0.9, 0.8, 0.6]);
  }

  #[test]
  fn nan_score_stops_decoding() {
    let output = output_with_scores(&[f32::NAN, 0.9], 2.0);
    assert!(output.decode(&labels(), 300, 200, 0.5, 4).unwrap().is_empty());

    let output = output_with_scores(&[0.9, f32::NAN, 0.8], 3.0);
    let detections = output.decode(&labels(), 300, 200, 0.5, 4).unwrap();
    assert_eq!(scores_of(&detections), vec![0.9]);
  }

  #[test]
  fn caps_results_at_max() {
    let output = output_with_scores(&[0.99, 0.95, 0.9, 0.85, 0.8, 0.75], 6.0);
    let detections = output.decode(&labels(), 300, 300, 0.5, 4).unwrap();
    assert_eq!(scores_of(&detections), vec![0.99, 0.95, 0.9, 0.85]);
  }

  #[test]
  fn never_reads_past_detection_count() {
    // 第三个槽位的类别索引越界，但检测数为 2，不应被读取
    let output = RawModelOutput::new(
      vec![[0.0, 0.0, 1.0, 1.0]; 3],
      vec![0.0, 1.0, 99.0],
      vec![0.9, 0.8, 0.7],
      2.0,
    )
    .unwrap();
    let detections = output.decode(&labels(), 10, 10, 0.5, 4).unwrap();
    assert_eq!(detections.len(), 2);
  }

  #[test]
  fn count_is_clamped_to_capacity() {
    let output = output_with_scores(&[0.9; MAX_DETECTION_NUM], 25.0);
    assert_eq!(output.valid_count(), MAX_DETECTION_NUM);
    assert_eq!(output_with_scores(&[0.9], -3.0).valid_count(), 0);
    assert_eq!(output_with_scores(&[0.9], f32::NAN).valid_count(), 0);
    assert_eq!(output_with_scores(&[0.9], 2.9).valid_count(), 2);
  }

  #[test]
  fn length_matches_leading_scores_above_threshold() {
    let cases: [(&[f32], f32, usize); 5] = [
      (&[0.9, 0.8], 2.0, 2),
      (&[0.9, 0.8, 0.7, 0.6, 0.55], 5.0, 4),
      (&[0.9, 0.8, 0.7, 0.6, 0.55], 3.0, 3),
      (&[0.5, 0.5, 0.49], 3.0, 2),
      (&[0.1], 1.0, 0),
    ];
    for (scores, count, expected) in cases {
      let detections = output_with_scores(scores, count)
        .decode(&labels(), 10, 10, 0.5, 4)
        .unwrap();
      assert_eq!(detections.len(), expected, "scores {scores:?}");
      assert!(
        detections
          .windows(2)
          .all(|pair| pair[0].score() >= pair[1].score())
      );
    }
  }

  #[test]
  fn from_flat_checks_shapes() {
    let output = RawModelOutput::from_flat(
      &[0.1, 0.2, 0.5, 0.6, 0.0, 0.0, 1.0, 1.0],
      &[0.0, 1.0],
      &[0.9, 0.4],
      &[2.0],
    )
    .unwrap();
    assert_eq!(output.capacity(), 2);
    assert_eq!(output.valid_count(), 2);

    assert!(RawModelOutput::from_flat(&[0.0; 5], &[0.0], &[0.9], &[1.0]).is_err());
    assert!(RawModelOutput::from_flat(&[0.0; 4], &[0.0], &[0.9], &[]).is_err());
    assert!(RawModelOutput::from_flat(&[0.0; 8], &[0.0], &[0.9, 0.8], &[1.0]).is_err());
  }
}
