//! 公共验证函数模块
//! 提供作答结果、响应时间、时间上限与存储键分量的校验，供两个评分适配器和存储层共用。

/// 限时适配器：准确率只能是 0 或 1
pub fn is_binary_accuracy(accuracy: f64) -> bool {
    accuracy == 0.0 || accuracy == 1.0
}

/// 仅准确率适配器：准确率在闭区间 [0,1] 内
pub fn is_ratio_accuracy(accuracy: f64) -> bool {
    (0.0..=1.0).contains(&accuracy)
}

/// 响应时间必须为有限正数（毫秒）
pub fn is_valid_response_time(response_time: f64) -> bool {
    response_time.is_finite() && response_time > 0.0
}

/// 时间上限必须为有限正数（毫秒）
pub fn is_valid_max_duration(max_duration: f64) -> bool {
    max_duration.is_finite() && max_duration > 0.0
}

/// 存储键分量：非空、不超过 128 字符、不含分隔符 ':'
pub fn validate_key_component(value: &str) -> Result<(), &'static str> {
    if value.is_empty() {
        return Err("key component must not be empty");
    }
    if value.chars().count() > 128 {
        return Err("key component must be at most 128 characters");
    }
    if value.contains(':') {
        return Err("key component must not contain ':'");
    }
    Ok(())
}
