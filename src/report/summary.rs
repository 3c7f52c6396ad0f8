//! Deterministic analysis summary.

use serde::{Deserialize, Serialize};

use super::metrics::{AggregatedMetrics, QUALITY_ALERT_LABEL};
use crate::core::*;

/// One headline figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMetric {
    pub metric: String,
    pub value: String,
    pub insight: String,
}

/// Narrative summary handed to reporting collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub title: String,
    pub summary: String,
    pub key_metrics: Vec<KeyMetric>,
    pub actionable_insights: Vec<String>,
    pub strategic_recommendations: Vec<String>,
}

/// Build the summary from the aggregated metrics alone.
pub fn deterministic_summary(docs: &[AuditedDocument], metrics: &AggregatedMetrics) -> AnalysisSummary {
    let key_metrics = metrics
        .labeled()
        .into_iter()
        .filter(|(label, _)| *label != QUALITY_ALERT_LABEL)
        .map(|(label, value)| KeyMetric {
            metric: label.into(),
            value,
            insight: String::new(),
        })
        .collect();

    if !docs.iter().any(AuditedDocument::is_postable) {
        return AnalysisSummary {
            title: "Análise Fiscal Concluída".into(),
            summary: "Não foram encontrados dados válidos para gerar um resumo detalhado.".into(),
            key_metrics,
            actionable_insights: vec![
                "Verificar a causa dos erros nos documentos importados para permitir uma análise completa."
                    .into(),
            ],
            strategic_recommendations: vec![
                "Implementar controles de qualidade nos arquivos enviados ao pipeline fiscal.".into(),
            ],
        };
    }

    let mut actionable_insights = vec![
        "Monitorar os produtos com maior variação de preço para prevenir distorções fiscais.".to_string(),
        "Revisar CFOPs utilizados para garantir alinhamento com operações reais.".to_string(),
    ];
    if let Some(alert) = &metrics.quality_alert {
        actionable_insights.push(alert.clone());
    }

    AnalysisSummary {
        title: "Panorama Fiscal Consolidado".into(),
        summary: "A análise determinística consolidou os principais indicadores fiscais da base \
                  processada, permitindo decisões mais assertivas sobre compliance e planejamento \
                  tributário."
            .into(),
        key_metrics,
        actionable_insights,
        strategic_recommendations: vec![
            "Aprimorar a governança de cadastros fiscais para reduzir riscos tributários.".into(),
            "Avaliar oportunidades de crédito com base na estimativa de IVA calculada.".into(),
        ],
    }
}
