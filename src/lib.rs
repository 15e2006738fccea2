// 该文件是 Tanjing （探镜） 项目的一部分。
// src/lib.rs - 库主文件
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

pub mod frame;
pub mod input;
pub mod model;
pub mod output;
pub mod task;

pub trait FromUrl {
  type Error;
  fn from_url(url: &url::Url) -> Result<Self, Self::Error>
  where
    Self: Sized;
}

pub trait FromUrlWithScheme: FromUrl {
  const SCHEME: &'static str;
}

/// URL 路径解码后的本地文件路径，解码失败时保留原样
pub(crate) fn url_file_path(url: &url::Url) -> std::path::PathBuf {
  let path = url.path();
  urlencoding::decode(path)
    .map(|decoded| std::path::PathBuf::from(decoded.into_owned()))
    .unwrap_or_else(|_| std::path::PathBuf::from(path))
}

/// 读取 URL 查询参数中的某一项
pub(crate) fn query_value(url: &url::Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;

  #[test]
  fn file_path_is_percent_decoded() {
    let url = url::Url::parse("image:///data/my photo/我的照片.jpg?font=a").unwrap();
    assert_eq!(url.path(), "/data/my%20photo/%E6%88%91%E7%9A%84%E7%85%A7%E7%89%87.jpg");
    assert_eq!(
      url_file_path(&url),
      Path::new("/data/my photo/我的照片.jpg")
    );
  }

  #[test]
  fn query_value_finds_key() {
    let url = url::Url::parse("folder:///out?record=json&always").unwrap();
    assert_eq!(query_value(&url, "record").as_deref(), Some("json"));
    assert_eq!(query_value(&url, "always").as_deref(), Some(""));
    assert_eq!(query_value(&url, "font"), None);
  }
}
