//! 配置校验模块
//!
//! 校验规则：
//! - 字段级规则 (`validator` derive)：table_name 非空、至少一个相机、容量与超时 >= 1
//! - camera index 唯一
//! - bind_addr 可解析为 SocketAddr (table 传输除外)
//! - 挂载变换各分量为有限数

use std::collections::HashSet;
use std::net::SocketAddr;

use ::validator::Validate;
use contracts::{ContractError, FusionConfig, TransportKind};

/// 校验 FusionConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &FusionConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_camera_indices(config)?;
    validate_bind_addr(config)?;
    validate_mount_transforms(config)?;
    Ok(())
}

/// 字段级规则
fn validate_fields(config: &FusionConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .map(|k| k.to_string())
            .min()
            .unwrap_or_default();
        ContractError::config_validation(field, errors.to_string())
    })
}

/// 校验 camera index 唯一性
fn validate_camera_indices(config: &FusionConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for camera in &config.cameras {
        if !seen.insert(camera.index) {
            return Err(ContractError::config_validation(
                format!("cameras[index={}]", camera.index),
                "duplicate camera index",
            ));
        }
    }
    Ok(())
}

/// 校验 UDP 绑定地址
fn validate_bind_addr(config: &FusionConfig) -> Result<(), ContractError> {
    if config.transport.kind == TransportKind::Table {
        return Ok(());
    }
    config
        .transport
        .bind_addr
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|e| {
            ContractError::config_validation(
                "transport.bind_addr",
                format!("'{}' is not a socket address: {e}", config.transport.bind_addr),
            )
        })
}

/// 校验挂载变换
fn validate_mount_transforms(config: &FusionConfig) -> Result<(), ContractError> {
    for camera in &config.cameras {
        let Some(t) = camera.camera_to_center else {
            continue;
        };
        let components = [
            t.translation.x,
            t.translation.y,
            t.translation.z,
            t.rotation.roll,
            t.rotation.pitch,
            t.rotation.yaw,
        ];
        if components.iter().any(|c| !c.is_finite()) {
            return Err(ContractError::config_validation(
                format!("cameras[index={}].camera_to_center", camera.index),
                "transform components must be finite",
            ));
        }
    }
    Ok(())
}
