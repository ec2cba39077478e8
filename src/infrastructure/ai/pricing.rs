// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// 模型单价（美元 / 1K 令牌）
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// 未知模型采用的保守默认单价
const DEFAULT_PRICE: ModelPrice = ModelPrice {
    input_per_1k: 0.01,
    output_per_1k: 0.03,
};

static PRICES: Lazy<HashMap<&'static str, ModelPrice>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "gpt-4o",
        ModelPrice {
            input_per_1k: 0.0025,
            output_per_1k: 0.01,
        },
    );
    m.insert(
        "gpt-4o-mini",
        ModelPrice {
            input_per_1k: 0.00015,
            output_per_1k: 0.0006,
        },
    );
    m.insert(
        "gpt-4-turbo",
        ModelPrice {
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        },
    );
    m.insert(
        "gpt-3.5-turbo",
        ModelPrice {
            input_per_1k: 0.0005,
            output_per_1k: 0.0015,
        },
    );
    m
});

/// 查询模型单价，未知模型回落到默认单价
pub fn price_for(model: &str) -> ModelPrice {
    PRICES.get(model).copied().unwrap_or(DEFAULT_PRICE)
}

/// 估算文本的令牌数（字符数÷4 启发式）
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// 调用前的花费估算
///
/// 输入按估算的提示令牌数计价，输出按最大生成令牌数计价。
pub fn estimate_cost(model: &str, prompt_tokens: u64, max_completion_tokens: u64) -> f64 {
    let price = price_for(model);
    prompt_tokens as f64 / 1000.0 * price.input_per_1k
        + max_completion_tokens as f64 / 1000.0 * price.output_per_1k
}

/// 调用后按实际用量重新计算花费，用于记账
pub fn actual_cost(model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
    let price = price_for(model);
    prompt_tokens as f64 / 1000.0 * price.input_per_1k
        + completion_tokens as f64 / 1000.0 * price.output_per_1k
}
