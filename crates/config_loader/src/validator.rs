//! 配置校验模块
//!
//! 校验规则：
//! - server.addr 形如 host:port（host 可为主机名，IPv6 需加方括号）
//! - server.max_body_bytes > 0
//! - store.flush_interval / store.save_timeout > 0
//! - store.high_water_mark > 0 (若设置)
//! - clickhouse url 以 http:// 或 https:// 开头
//! - database / table 仅含 [A-Za-z0-9_]
//! - file sink base_path 非空

use contracts::{ContractError, ServiceBlueprint, SinkConfig};

/// 校验 ServiceBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    validate_server(blueprint)?;
    validate_store(blueprint)?;
    validate_sink(blueprint)?;
    Ok(())
}

fn validate_server(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let server = &blueprint.server;

    if !is_host_port(&server.addr) {
        return Err(ContractError::config_validation(
            "server.addr",
            format!("'{}' is not a valid listen address (host:port)", server.addr),
        ));
    }

    if server.max_body_bytes == 0 {
        return Err(ContractError::config_validation(
            "server.max_body_bytes",
            "max_body_bytes must be > 0",
        ));
    }

    Ok(())
}

/// host 非空，port 为 u16；裸 IPv6 必须写成 `[::1]:8080`
fn is_host_port(addr: &str) -> bool {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return false;
    };
    if host.is_empty() || port.parse::<u16>().is_err() {
        return false;
    }
    match host.strip_prefix('[') {
        Some(rest) => rest
            .strip_suffix(']')
            .is_some_and(|ip| ip.parse::<std::net::Ipv6Addr>().is_ok()),
        None => !host.contains(':') && !host.contains(char::is_whitespace),
    }
}

/// 校验刷盘时序
fn validate_store(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let store = &blueprint.store;

    if store.flush_interval.is_zero() {
        return Err(ContractError::config_validation(
            "store.flush_interval",
            "flush_interval must be > 0",
        ));
    }

    if store.save_timeout.is_zero() {
        return Err(ContractError::config_validation(
            "store.save_timeout",
            "save_timeout must be > 0",
        ));
    }

    if store.high_water_mark == Some(0) {
        return Err(ContractError::config_validation(
            "store.high_water_mark",
            "high_water_mark must be > 0 when set",
        ));
    }

    Ok(())
}

/// 校验 sink 配置
fn validate_sink(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    match &blueprint.sink {
        SinkConfig::ClickHouse(ch) => {
            if !(ch.url.starts_with("http://") || ch.url.starts_with("https://")) {
                return Err(ContractError::config_validation(
                    "sink.url",
                    format!("url must start with http:// or https://, got '{}'", ch.url),
                ));
            }
            validate_identifier("sink.database", &ch.database)?;
            validate_identifier("sink.table", &ch.table)?;
        }
        SinkConfig::File(file) => {
            if file.base_path.as_os_str().is_empty() {
                return Err(ContractError::config_validation(
                    "sink.base_path",
                    "base_path cannot be empty",
                ));
            }
        }
        SinkConfig::Log => {}
    }
    Ok(())
}

/// 标识符会被拼接进 SQL，只允许 [A-Za-z0-9_]
fn validate_identifier(field: &str, value: &str) -> Result<(), ContractError> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(ContractError::config_validation(
            field,
            format!("'{value}' must match [A-Za-z0-9_]+"),
        ));
    }
    Ok(())
}
