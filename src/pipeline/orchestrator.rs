// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::domain::models::job::Job;
use crate::domain::services::completion::{
    CompletionError, CompletionRequest, CompletionResponse, CompletionService,
};
use crate::pipeline::result::AnalysisResult;
use crate::pipeline::steps::{
    self, StepSpec, ANALYST_SYSTEM_MESSAGE, PIPELINE_STEPS,
};

/// 一个步骤完成后的进度更新
#[derive(Debug, Clone)]
pub struct StepUpdate {
    /// 步骤序号（1起）
    pub index: usize,
    /// 步骤稳定名称
    pub name: &'static str,
    /// 人类可读标签
    pub label: &'static str,
    /// 里程碑百分比
    pub percent: u8,
    /// 本步骤消耗的令牌数
    pub tokens_used: u64,
    /// 本步骤的花费（美元）
    pub cost: f64,
}

/// 步骤观察者特质
///
/// 工作器实现该特质以在每个步骤边界写入进度并推送通知。
#[async_trait]
pub trait StepObserver: Send + Sync {
    /// 步骤完成回调
    ///
    /// # 返回值
    ///
    /// 返回 false 表示作业应在该步骤边界停止（协作式取消）。
    async fn on_step_completed(&self, update: StepUpdate) -> bool;
}

/// 管道错误类型
#[derive(Error, Debug)]
pub enum PipelineError {
    /// AI补全失败（已含重试耗尽后的最终分类）
    #[error("{0}")]
    Completion(#[from] CompletionError),

    /// 作业在步骤边界被取消
    #[error("Cancelled by user")]
    Cancelled,

    /// 输入不合法
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// AI编排服务
///
/// 按固定顺序驱动领域步骤：商业分析 → 市场验证 →
/// 功能生成 → 技术栈推荐，步骤间严格串行（后一步的
/// 提示词依赖前一步的产出），最终聚合为一个结果。
pub struct PipelineOrchestrator {
    ai: Arc<dyn CompletionService>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl PipelineOrchestrator {
    /// 创建新的编排服务实例
    ///
    /// # 参数
    ///
    /// * `ai` - 补全服务（通常为弹性客户端）
    /// * `model` - 使用的模型名称
    /// * `max_tokens` - 每步骤的最大生成令牌数
    /// * `temperature` - 采样温度
    pub fn new(ai: Arc<dyn CompletionService>, model: String, max_tokens: u32, temperature: f32) -> Self {
        Self {
            ai,
            model,
            max_tokens,
            temperature,
        }
    }

    /// 执行一次完整的管道运行
    ///
    /// 每个步骤完成后通过观察者上报一次进度；观察者要求
    /// 停止时在下一个步骤边界返回 `Cancelled`，不打断已经
    /// 发出的AI调用。
    pub async fn run(
        &self,
        job: &Job,
        observer: &dyn StepObserver,
    ) -> Result<AnalysisResult, PipelineError> {
        let input = &job.input;
        let mut result = AnalysisResult {
            input: input.clone(),
            ..Default::default()
        };

        // 步骤1：校验并保存输入
        if input.description.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }
        self.report(observer, 0, None).await?;

        // 步骤2：商业分析
        let analysis = self
            .ask(steps::business_analysis_prompt(input))
            .await?;
        result.business_analysis = analysis.content.clone();
        self.report(observer, 1, Some(&analysis)).await?;

        // 步骤3：市场验证
        let market = self
            .ask(steps::market_validation_prompt(input, &result.business_analysis))
            .await?;
        result.market_validation = market.content.clone();
        self.report(observer, 2, Some(&market)).await?;

        // 步骤4：功能生成
        let features = self
            .ask(steps::feature_generation_prompt(input, &result.business_analysis))
            .await?;
        result.features = features.content.clone();
        self.report(observer, 3, Some(&features)).await?;

        // 步骤5：技术栈推荐
        let tech = self
            .ask(steps::tech_stack_prompt(input, &result.features))
            .await?;
        result.tech_stack = tech.content.clone();
        self.report(observer, 4, Some(&tech)).await?;

        // 步骤6：结果聚合
        result.aggregate();
        self.report(observer, 5, None).await?;

        // 步骤7：最终化
        result.generated_at = Some(Utc::now());
        self.report(observer, 6, None).await?;

        info!("Pipeline run finished for job {}", job.id);
        Ok(result)
    }

    async fn ask(&self, prompt: String) -> Result<CompletionResponse, CompletionError> {
        self.ai
            .complete(CompletionRequest {
                model: self.model.clone(),
                prompt,
                system_message: Some(ANALYST_SYSTEM_MESSAGE.to_string()),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .await
    }

    async fn report(
        &self,
        observer: &dyn StepObserver,
        step_idx: usize,
        response: Option<&CompletionResponse>,
    ) -> Result<(), PipelineError> {
        let spec: &StepSpec = &PIPELINE_STEPS[step_idx];
        let update = StepUpdate {
            index: step_idx + 1,
            name: spec.name,
            label: spec.label,
            percent: spec.percent,
            tokens_used: response.map(|r| r.tokens_used as u64).unwrap_or(0),
            cost: response.map(|r| r.cost).unwrap_or(0.0),
        };
        if !observer.on_step_completed(update).await {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod tests;
