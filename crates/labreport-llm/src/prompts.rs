//! Prompts for lab report interpretation and comparison.
//!
//! The analysis prompt asks for a fixed Markdown layout whose first section
//! carries a `**检测项目**:` line; record summaries are derived from it.

use chrono::{DateTime, Local};
use labreport_core::models::{AnalysisRecord, PatientInfo};

/// Shown when a dated record has an unusable timestamp.
const UNKNOWN_DATE: &str = "未注明";

/// Body of the analysis prompt, after the role line and patient context.
const ANALYSIS_INSTRUCTIONS: &str = r#"
请严格按照以下结构输出分析结果（使用Markdown格式）：

### 1. 基本信息摘要
*   **检测项目**: (例如：血常规、肝功能、肾功能、尿常规等。请务必用一句话总结主要项目)
*   **样本日期**: (如果可见，不可见则写未注明)

### 2. 异常指标分析
请列出所有超出正常参考范围的指标。如果没有异常，请明确说明。
*   **指标名称**: [数值] (参考范围: [范围]) [偏高/偏低]
*   *临床意义*: 简要解释该指标异常可能代表的含义。

### 3. 综合解读与可能风险
基于上述结果{basis}，结合医学知识进行逻辑推理：
*   这些结果组合起来可能指向什么健康问题？(例如：细菌感染、贫血、肝损伤等)
*   目前的严重程度评估。

### 4. 建议与下一步
*   生活方式建议（饮食、休息等）。
*   是否需要复查或进一步检查（如CT、B超）。
*   **免责声明**: 必须包含一句提示，强调本结果由AI生成，仅供参考，不能替代医生诊断。

请确保语气专业、客观，但也通俗易懂。如果图片模糊无法识别，请直接指出。"#;

const COMPARISON_RULES: &str = r#"
请生成一份对比分析报告，严格遵循以下规则：
1.  **只列出不合理或显著的变化**：忽略正常的生理波动或微小的数值差异。
2.  **变化解读**：对于列出的每一项变化，请说明其临床意义（例如：病情好转、恶化、出现新并发症、药物起效等）。
3.  如果两份报告主要项目不同（无法对比），请明确指出。

输出格式建议（Markdown）：

### 📊 重点指标变化
*   **[指标名称]**: [化验单A数值] -> [化验单B数值]
    *   *解读*: ...

### 💡 综合趋势分析
...

### 📝 建议
...
"#;

/// Patient context block listing only the fields that are present.
///
/// Returns an empty string when nothing is known about the patient.
pub fn build_patient_context(info: Option<&PatientInfo>) -> String {
    let Some(info) = info else {
        return String::new();
    };

    let lines: Vec<String> = [
        ("姓名", &info.name),
        ("年龄", &info.age),
        ("性别", &info.gender),
        ("临床诊断/主诉", &info.diagnosis),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| format!("{}: {}", label, v))
    })
    .collect();

    if lines.is_empty() {
        String::new()
    } else {
        format!("\n### 患者基本信息\n{}\n", lines.join("\n"))
    }
}

/// Text part sent alongside the report files.
pub fn build_analysis_prompt(patient_info: Option<&PatientInfo>) -> String {
    let context = build_patient_context(patient_info);
    let basis = if context.is_empty() { "" } else { "及患者信息" };
    format!(
        "你是一位经验丰富的临床医学专家和病理学家。请分析所提供的化验单图片/PDF。{}\n{}",
        context,
        ANALYSIS_INSTRUCTIONS.replace("{basis}", basis)
    )
}

/// Prompt comparing two earlier interpretations, older first.
///
/// Only the stored analysis texts are sent; they already carry the values.
pub fn build_comparison_prompt(older: &AnalysisRecord, newer: &AnalysisRecord) -> String {
    format!(
        "你是一位专业的医学顾问。请对比以下两份化验单的解读记录，找出重要的病情变化。\n\n\
         === 化验单 A (日期: {}) ===\n{}\n\n\
         === 化验单 B (日期: {}) ===\n{}\n{}",
        record_date(older),
        older.analysis_result(),
        record_date(newer),
        newer.analysis_result(),
        COMPARISON_RULES
    )
}

fn record_date(record: &AnalysisRecord) -> String {
    record
        .created_at()
        .map(|utc| DateTime::<Local>::from(utc).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labreport_core::models::{FilePayload, RecordParts};

    fn record(id: &str, timestamp: i64, text: &str) -> AnalysisRecord {
        AnalysisRecord::restore(RecordParts {
            id: id.into(),
            timestamp,
            files: vec![FilePayload::from_bytes("a.jpg", "image/jpeg", b"jpeg")],
            patient_info: None,
            analysis_result: text.into(),
            summary: "血常规".into(),
        })
        .unwrap()
    }

    #[test]
    fn test_patient_context_lists_present_fields() {
        let info = PatientInfo::new(Some("张三".into()), Some("45".into()), None, Some("乏力".into()));
        let context = build_patient_context(Some(&info));
        assert!(context.contains("### 患者基本信息"));
        assert!(context.contains("姓名: 张三"));
        assert!(context.contains("年龄: 45"));
        assert!(context.contains("临床诊断/主诉: 乏力"));
        assert!(!context.contains("性别"));
    }

    #[test]
    fn test_patient_context_empty() {
        assert!(build_patient_context(None).is_empty());
        assert!(build_patient_context(Some(&PatientInfo::default())).is_empty());
    }

    #[test]
    fn test_analysis_prompt_mentions_patient_only_when_known() {
        let without = build_analysis_prompt(None);
        assert!(without.contains("**检测项目**"));
        assert!(!without.contains("及患者信息"));
        assert!(!without.contains("{basis}"));

        let with = build_analysis_prompt(Some(&PatientInfo::named("李四")));
        assert!(with.contains("姓名: 李四"));
        assert!(with.contains("基于上述结果及患者信息"));
    }

    #[test]
    fn test_comparison_prompt_orders_reports() {
        let older = record("a", 1_704_067_200_000, "白细胞 12.0");
        let newer = record("b", 1_706_745_600_000, "白细胞 8.1");
        let prompt = build_comparison_prompt(&older, &newer);

        let a = prompt.find("=== 化验单 A").unwrap();
        let b = prompt.find("=== 化验单 B").unwrap();
        assert!(a < b);
        assert!(prompt.find("白细胞 12.0").unwrap() < prompt.find("白细胞 8.1").unwrap());
        assert!(prompt.contains("重点指标变化"));
    }
}
