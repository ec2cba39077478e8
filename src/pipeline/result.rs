// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::models::job::JobInput;

/// 管道的聚合结果负载
///
/// 各AI步骤的产出在结果聚合步骤合并为一个文档，
/// 成功时随进度记录一起返回给调用方。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// 原始输入的快照
    pub input: JobInput,
    /// 商业分析
    pub business_analysis: String,
    /// 市场验证
    pub market_validation: String,
    /// 功能列表
    pub features: String,
    /// 技术栈推荐
    pub tech_stack: String,
    /// 一句话摘要
    pub summary: String,
    /// 生成完成时间（最终化步骤设置）
    pub generated_at: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    /// 聚合步骤：由已产出的各部分构建摘要
    pub fn aggregate(&mut self) {
        self.summary = format!(
            "Business analysis, market validation, {} feature notes and a tech stack \
            recommendation generated for: {}",
            self.features.lines().count(),
            self.input.description
        );
    }
}
