use std::io::{self, Read};
use flate2::{Compression, write::GzEncoder, read::GzDecoder};

/// 魔数常量 - 用于标识题库打包文件
pub const MAGIC_BYTES: &'static [u8] = b"IQCAT"; // Interview Question CATalog

/// 当前写入的打包格式版本
pub const BUNDLE_VERSION: [u8; 2] = [1, 0];

/// 头部长度：魔数 + 版本号(2) + 原始数据大小(4)
const HEADER_LEN: usize = MAGIC_BYTES.len() + 2 + 4;

/// 将对象序列化为二进制格式
pub fn to_binary<T: serde::Serialize>(obj: &T) -> Result<Vec<u8>, io::Error> {
    bincode::serde::encode_to_vec(obj, bincode::config::standard())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("序列化失败: {}", e)))
}

/// 从二进制格式反序列化对象
pub fn from_binary<T: for<'a> serde::de::Deserialize<'a>>(data: &[u8]) -> Result<T, io::Error> {
    bincode::serde::decode_from_slice(data, bincode::config::standard())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("反序列化失败: {}", e)))
        .map(|(value, _)| value)
}

/// 将对象序列化并压缩为打包格式
pub fn to_compressed<T: serde::Serialize>(obj: &T, version: [u8; 2]) -> Result<Vec<u8>, io::Error> {
    let binary = to_binary(obj)?;

    let mut output = Vec::with_capacity(HEADER_LEN + binary.len() / 2);
    output.extend_from_slice(MAGIC_BYTES);
    output.extend_from_slice(&version);
    output.extend_from_slice(&(binary.len() as u32).to_le_bytes());

    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    std::io::Write::write_all(&mut encoder, &binary)?;
    output.extend_from_slice(&encoder.finish()?);

    Ok(output)
}

/// 从打包格式解压并反序列化对象，支持到当前格式版本
pub fn from_compressed<T: for<'a> serde::de::Deserialize<'a>>(data: &[u8]) -> Result<T, io::Error> {
    from_compressed_with_max_version(data, BUNDLE_VERSION[0])
}

/// 从打包格式解压并反序列化对象，允许指定支持的最大主版本
pub fn from_compressed_with_max_version<T: for<'a> serde::de::Deserialize<'a>>(
    data: &[u8],
    max_version: u8,
) -> Result<T, io::Error> {
    let (_, original_size) = read_header(data, max_version)?;

    let mut decoder = GzDecoder::new(&data[HEADER_LEN..]);
    let mut decompressed = Vec::with_capacity(original_size);
    decoder.read_to_end(&mut decompressed)?;

    if decompressed.len() != original_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("解压后数据大小不匹配: 期望 {} 字节, 实际 {} 字节",
                   original_size, decompressed.len())
        ));
    }

    from_binary(&decompressed)
}

/// 验证打包数据头部是否有效，返回其版本号
pub fn validate_compressed_data(data: &[u8]) -> Result<[u8; 2], io::Error> {
    read_header(data, BUNDLE_VERSION[0]).map(|(version, _)| version)
}

// 解析头部：校验长度、魔数和版本，返回版本号与原始数据大小
fn read_header(data: &[u8], max_version: u8) -> Result<([u8; 2], usize), io::Error> {
    if data.len() < HEADER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("数据太短，无法解析: {} 字节", data.len())
        ));
    }

    if &data[0..MAGIC_BYTES.len()] != MAGIC_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "无效的文件格式：魔数不匹配"
        ));
    }

    let version_offset = MAGIC_BYTES.len();
    let version = [data[version_offset], data[version_offset + 1]];
    if version[0] > max_version {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("不支持的版本: {}.{}", version[0], version[1])
        ));
    }

    let size_offset = version_offset + 2;
    let mut size_bytes = [0u8; 4];
    size_bytes.copy_from_slice(&data[size_offset..size_offset + 4]);

    Ok((version, u32::from_le_bytes(size_bytes) as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_data() {
        let err = validate_compressed_data(b"PKZIP\x03\x00\x00\x00\x00\x00").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let err = validate_compressed_data(b"IQ").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_newer_major_version() {
        let data = to_compressed(&vec!["a".to_string()], [2, 0]).unwrap();
        assert!(from_compressed::<Vec<String>>(&data).is_err());
        assert_eq!(validate_compressed_data(&to_compressed(&1u32, BUNDLE_VERSION).unwrap()).unwrap(), BUNDLE_VERSION);
    }
}
