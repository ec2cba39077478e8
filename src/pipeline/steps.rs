// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::JobInput;

/// 管道总步骤数，固定为7
pub const TOTAL_STEPS: u32 = 7;

/// 单个管道步骤的静态描述
#[derive(Debug, Clone, Copy)]
pub struct StepSpec {
    /// 步骤的稳定名称（写入指标的步骤列表）
    pub name: &'static str,
    /// 人类可读的步骤标签（写入进度记录）
    pub label: &'static str,
    /// 该步骤完成后的里程碑百分比（固定值，与耗时无关）
    pub percent: u8,
}

/// 固定顺序的管道步骤表
///
/// 里程碑百分比 15→30→50→70→85→95→100。
pub const PIPELINE_STEPS: [StepSpec; TOTAL_STEPS as usize] = [
    StepSpec {
        name: "input_validation",
        label: "Validating and saving input",
        percent: 15,
    },
    StepSpec {
        name: "business_analysis",
        label: "Generating business analysis",
        percent: 30,
    },
    StepSpec {
        name: "market_validation",
        label: "Validating market opportunity",
        percent: 50,
    },
    StepSpec {
        name: "feature_generation",
        label: "Generating product features",
        percent: 70,
    },
    StepSpec {
        name: "tech_stack_recommendation",
        label: "Recommending technology stack",
        percent: 85,
    },
    StepSpec {
        name: "result_aggregation",
        label: "Aggregating results",
        percent: 95,
    },
    StepSpec {
        name: "finalization",
        label: "Finalizing analysis",
        percent: 100,
    },
];

/// 按固定顺序返回全部步骤名称
pub fn step_names() -> Vec<String> {
    PIPELINE_STEPS.iter().map(|s| s.name.to_string()).collect()
}

pub const ANALYST_SYSTEM_MESSAGE: &str = "You are an experienced startup business analyst. \
    Provide concise, structured analysis in plain text. Avoid marketing fluff.";

/// 商业分析提示词
pub fn business_analysis_prompt(input: &JobInput) -> String {
    format!(
        "Analyze the following product idea as a business opportunity.\n\
        Idea: {}\n\
        Target audience: {}\n\
        Problem being solved: {}\n\
        Cover: value proposition, revenue potential, key risks, and competitive landscape.",
        input.description, input.target_audience, input.problem_statement
    )
}

/// 市场验证提示词，依赖上一阶段的商业分析
pub fn market_validation_prompt(input: &JobInput, business_analysis: &str) -> String {
    format!(
        "Given this business analysis:\n{}\n\n\
        Validate the market opportunity for the idea \"{}\" targeting {}.\n\
        Cover: market size estimate, demand signals, adoption barriers, and a go/no-go verdict.",
        business_analysis, input.description, input.target_audience
    )
}

/// 功能生成提示词，依赖商业分析与用户偏好
pub fn feature_generation_prompt(input: &JobInput, business_analysis: &str) -> String {
    let preferences = if input.preferred_features.is_empty() {
        String::from("none stated")
    } else {
        input.preferred_features.join(", ")
    };
    format!(
        "Based on this business analysis:\n{}\n\n\
        Propose a prioritized feature list for an MVP of \"{}\".\n\
        User-stated feature preferences: {}.\n\
        For each feature give a one-line rationale.",
        business_analysis, input.description, preferences
    )
}

/// 技术栈推荐提示词，依赖已生成的功能列表
pub fn tech_stack_prompt(input: &JobInput, features: &str) -> String {
    let preferences = if input.preferred_tech.is_empty() {
        String::from("none stated")
    } else {
        input.preferred_tech.join(", ")
    };
    format!(
        "Given this planned feature set:\n{}\n\n\
        Recommend a technology stack to build \"{}\".\n\
        User-stated technology preferences: {}.\n\
        Cover: frontend, backend, data storage, hosting, and one alternative per choice.",
        features, input.description, preferences
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seven_steps_with_monotonic_milestones() {
        assert_eq!(PIPELINE_STEPS.len(), TOTAL_STEPS as usize);
        assert_eq!(PIPELINE_STEPS.last().unwrap().percent, 100);

        let percents: Vec<u8> = PIPELINE_STEPS.iter().map(|s| s.percent).collect();
        assert_eq!(percents, vec![15, 30, 50, 70, 85, 95, 100]);

        let mut sorted = percents.clone();
        sorted.sort_unstable();
        assert_eq!(percents, sorted);
    }

    #[test]
    fn test_step_names_are_unique() {
        let names = step_names();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }
}
