//! Fixture data used when nothing has been stored locally yet.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::json;

use crate::models::*;

const HOUR: i64 = 3_600;
const DAY: i64 = 86_400;

fn ago(secs: i64) -> DateTime<Utc> {
    Utc::now() - Duration::seconds(secs)
}

fn ahead(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs)
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn user(id: &str, name: &str, email: &str, role: Role, age: i64) -> User {
    User {
        id: id.into(),
        name: name.into(),
        email: email.into(),
        role,
        created_at: ago(age),
        updated_at: ago(age),
    }
}

/// The account returned for the fixed admin credential.
pub fn admin_user() -> User {
    user("admin-001", "Administrador", "admin@capymes.com", Role::Admin, 0)
}

pub fn users() -> Vec<User> {
    vec![
        admin_user(),
        user("user-001", "João Silva", "joao@capymes.com", Role::Supervisor, DAY),
        user("user-002", "Maria Santos", "maria@capymes.com", Role::Operator, 2 * DAY),
        user("user-003", "Pedro Costa", "pedro@capymes.com", Role::Operator, 3 * DAY),
        user("user-004", "Ana Oliveira", "ana@capymes.com", Role::Quality, 4 * DAY),
        user("user-005", "Carlos Ferreira", "carlos@capymes.com", Role::Maintenance, 5 * DAY),
    ]
}

pub fn production_lines() -> Vec<ProductionLine> {
    let line = |id: &str, name: &str, description: &str, capacity| ProductionLine {
        id: id.into(),
        name: name.into(),
        description: Some(description.into()),
        status: LineStatus::Active,
        capacity,
        created_at: ago(0),
        updated_at: ago(0),
    };
    vec![
        line("line-001", "Linha 1 - Montagem", "Linha principal de montagem de produtos", 150),
        line("line-002", "Linha 2 - Embalagem", "Linha de embalagem e acabamento", 200),
        line("line-003", "Linha 3 - Teste", "Linha de testes e controle de qualidade", 100),
    ]
}

pub fn equipment() -> Vec<Equipment> {
    let eq = |id: &str, name: &str, code: &str, kind: &str, line: &str, status, last, next| Equipment {
        id: id.into(),
        name: name.into(),
        code: code.into(),
        equipment_type: kind.into(),
        production_line_id: Some(line.into()),
        status,
        last_maintenance: last,
        next_maintenance: next,
        specifications: None,
        created_at: ago(0),
        updated_at: ago(0),
    };
    vec![
        eq("eq-001", "Esteira Principal", "EST-001", "Transporte", "line-001",
            EquipmentStatus::Operational, date(2024, 1, 15), date(2024, 4, 15)),
        eq("eq-002", "Robot Soldador", "ROB-001", "Soldagem", "line-001",
            EquipmentStatus::Operational, date(2024, 2, 1), date(2024, 5, 1)),
        eq("eq-003", "Máquina Embalagem", "EMB-001", "Embalagem", "line-002",
            EquipmentStatus::Maintenance, date(2024, 1, 20), date(2024, 4, 20)),
        eq("eq-004", "Tester Automático", "TST-001", "Teste", "line-003",
            EquipmentStatus::Operational, date(2024, 2, 10), date(2024, 5, 10)),
    ]
}

pub fn production_orders() -> Vec<ProductionOrder> {
    vec![
        ProductionOrder {
            id: "po-001".into(),
            order_number: "OP-2024-001".into(),
            product_name: "Produto Alpha".into(),
            product_code: Some("ALPHA-001".into()),
            status: OrderStatus::InProduction,
            quantity: 100,
            produced_quantity: 65,
            priority: Priority::High,
            production_line_id: Some("line-001".into()),
            start_date: Some(ago(2 * HOUR)),
            end_date: None,
            estimated_duration: Some(480),
            actual_duration: None,
            created_by: Some("user-001".into()),
            created_at: ago(DAY),
            updated_at: ago(0),
        },
        ProductionOrder {
            id: "po-002".into(),
            order_number: "OP-2024-002".into(),
            product_name: "Produto Beta".into(),
            product_code: Some("BETA-001".into()),
            status: OrderStatus::Pending,
            quantity: 50,
            produced_quantity: 0,
            priority: Priority::Normal,
            production_line_id: Some("line-002".into()),
            start_date: None,
            end_date: None,
            estimated_duration: Some(240),
            actual_duration: None,
            created_by: Some("user-002".into()),
            created_at: ago(2 * DAY),
            updated_at: ago(2 * DAY),
        },
        ProductionOrder {
            id: "po-003".into(),
            order_number: "OP-2024-003".into(),
            product_name: "Produto Gamma".into(),
            product_code: Some("GAMMA-001".into()),
            status: OrderStatus::Completed,
            quantity: 75,
            produced_quantity: 75,
            priority: Priority::Low,
            production_line_id: Some("line-001".into()),
            start_date: Some(ago(3 * DAY)),
            end_date: Some(ago(DAY)),
            estimated_duration: Some(360),
            actual_duration: Some(340),
            created_by: Some("user-001".into()),
            created_at: ago(4 * DAY),
            updated_at: ago(DAY),
        },
    ]
}

pub fn quality_inspections() -> Vec<QualityInspection> {
    let qi = |id: &str, number: &str, order: &str, kind: &str, status, sample, defects, rate, notes: &str, age| {
        QualityInspection {
            id: id.into(),
            inspection_number: number.into(),
            production_order_id: Some(order.into()),
            inspector_id: Some("user-004".into()),
            inspection_type: kind.into(),
            status,
            sample_size: sample,
            defects_found: defects,
            conformity_rate: rate,
            observations: Some(notes.into()),
            inspection_date: ago(age),
            created_at: ago(age),
            updated_at: ago(age),
        }
    };
    vec![
        qi("qi-001", "QI-2024-001", "po-001", "Inspeção Visual", InspectionStatus::Approved,
            10, 0, 100.0, "Produto conforme especificações", 0),
        qi("qi-002", "QI-2024-002", "po-003", "Teste Funcional", InspectionStatus::Approved,
            5, 1, 80.0, "Um item com defeito menor", DAY),
        qi("qi-003", "QI-2024-003", "po-001", "Inspeção Dimensional", InspectionStatus::Pending,
            15, 0, 0.0, "Aguardando inspeção", 0),
    ]
}

pub fn maintenance_orders() -> Vec<MaintenanceOrder> {
    vec![
        MaintenanceOrder {
            id: "mo-001".into(),
            order_number: "MO-2024-001".into(),
            equipment_id: Some("eq-003".into()),
            kind: MaintenanceType::Corrective,
            priority: Priority::High,
            status: MaintenanceStatus::InProgress,
            description: "Substituição de correia transportadora".into(),
            assigned_to: Some("user-005".into()),
            scheduled_date: Some(ahead(HOUR)),
            started_at: None,
            completed_at: None,
            estimated_hours: Some(4.0),
            actual_hours: None,
            cost: None,
            parts_used: None,
            notes: None,
            created_by: Some("user-002".into()),
            created_at: ago(0),
            updated_at: ago(0),
        },
        MaintenanceOrder {
            id: "mo-002".into(),
            order_number: "MO-2024-002".into(),
            equipment_id: Some("eq-002".into()),
            kind: MaintenanceType::Preventive,
            priority: Priority::Normal,
            status: MaintenanceStatus::Open,
            description: "Manutenção preventiva mensal".into(),
            assigned_to: Some("user-005".into()),
            scheduled_date: Some(ahead(2 * DAY)),
            started_at: None,
            completed_at: None,
            estimated_hours: Some(2.5),
            actual_hours: None,
            cost: None,
            parts_used: None,
            notes: None,
            created_by: Some("user-001".into()),
            created_at: ago(0),
            updated_at: ago(0),
        },
        MaintenanceOrder {
            id: "mo-003".into(),
            order_number: "MO-2024-003".into(),
            equipment_id: Some("eq-004".into()),
            kind: MaintenanceType::Predictive,
            priority: Priority::Low,
            status: MaintenanceStatus::Completed,
            description: "Calibração de sensores".into(),
            assigned_to: Some("user-005".into()),
            scheduled_date: Some(ago(DAY)),
            started_at: Some(ago(DAY)),
            completed_at: Some(ago(23 * HOUR)),
            estimated_hours: Some(1.5),
            actual_hours: Some(1.0),
            cost: Some(150.0),
            parts_used: None,
            notes: None,
            created_by: Some("user-002".into()),
            created_at: ago(2 * DAY),
            updated_at: ago(23 * HOUR),
        },
    ]
}

pub fn traceability_records() -> Vec<TraceabilityRecord> {
    let tr = |id: &str, batch: &str, order: &str, eq: &str, operation: &str, age, parameters, quality| {
        TraceabilityRecord {
            id: id.into(),
            batch_number: batch.into(),
            production_order_id: Some(order.into()),
            equipment_id: Some(eq.into()),
            operation: operation.into(),
            operator_id: Some("user-003".into()),
            timestamp: ago(age),
            parameters: Some(parameters),
            quality_data: Some(quality),
            notes: None,
            created_at: ago(age),
        }
    };
    vec![
        tr("tr-001", "BATCH-2024-001", "po-001", "eq-001", "Transporte Inicial", HOUR,
            json!({ "speed": 1.2, "temperature": 22 }),
            json!({ "weight": 1.5, "dimensions": "10x5x3" })),
        tr("tr-002", "BATCH-2024-001", "po-001", "eq-002", "Soldagem", HOUR / 2,
            json!({ "temperature": 350, "pressure": 2.5 }),
            json!({ "weld_quality": "A", "resistance": 95 })),
        tr("tr-003", "BATCH-2024-002", "po-003", "eq-004", "Teste Final", DAY,
            json!({ "voltage": 12, "current": 2.1 }),
            json!({ "pass": true, "score": 98 })),
    ]
}

pub fn ai_alerts() -> Vec<AIAlert> {
    let alert = |id: &str, title: &str, message: &str, severity, category, source: &str, age| AIAlert {
        id: id.into(),
        title: title.into(),
        message: message.into(),
        severity,
        category,
        source_table: Some(source.into()),
        source_id: None,
        is_read: false,
        is_resolved: false,
        resolved_by: None,
        resolved_at: None,
        created_at: ago(age),
    };

    let mut resolved = alert(
        "alert-003",
        "Meta de Produção Atingida",
        "Ordem OP-2024-003 foi concluída com sucesso!",
        AlertSeverity::Success,
        AlertCategory::Production,
        "production_orders",
        DAY,
    );
    resolved.is_read = true;
    resolved.is_resolved = true;
    resolved.resolved_by = Some("user-001".into());
    resolved.resolved_at = Some(ago(DAY));

    vec![
        alert("alert-001", "Eficiência Baixa Detectada",
            "A linha de produção 1 está operando com 65% de eficiência. Recomenda-se verificação.",
            AlertSeverity::Warning, AlertCategory::Efficiency, "production_lines", HOUR),
        alert("alert-002", "Manutenção Preventiva Vencida",
            "Equipamento EMB-001 está com manutenção preventiva vencida há 5 dias.",
            AlertSeverity::Error, AlertCategory::Maintenance, "equipment", 2 * HOUR),
        resolved,
        alert("alert-004", "Qualidade Abaixo do Padrão",
            "Inspeção QI-2024-002 detectou taxa de conformidade de 80%. Investigar causa.",
            AlertSeverity::Warning, AlertCategory::Quality, "quality_inspections", 3 * HOUR),
        alert("alert-005", "Equipamento em Manutenção",
            "Robot Soldador ROB-001 entrará em manutenção preventiva em 2 dias.",
            AlertSeverity::Info, AlertCategory::Maintenance, "equipment", 4 * HOUR),
    ]
}

pub fn system_settings() -> Vec<SystemSetting> {
    let setting = |id: &str, key: &str, value: &str, description: &str, category: &str| SystemSetting {
        id: id.into(),
        key: key.into(),
        value: value.into(),
        description: Some(description.into()),
        category: category.into(),
        updated_by: None,
        updated_at: ago(0),
    };
    vec![
        setting("setting-001", "company_name", "CapyMEs Industries", "Nome da empresa", "general"),
        setting("setting-002", "oee_target", "85", "Meta de OEE em porcentagem", "production"),
        setting("setting-003", "quality_threshold", "95",
            "Limite mínimo de qualidade em porcentagem", "quality"),
        setting("setting-004", "maintenance_alert_days", "7",
            "Dias de antecedência para alertas de manutenção", "maintenance"),
        setting("setting-005", "shift_duration", "8", "Duração do turno em horas", "production"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn fixture_ids_are_unique() {
        let ids: Vec<String> = users().into_iter().map(|u| u.id)
            .chain(production_orders().into_iter().map(|o| o.id))
            .chain(equipment().into_iter().map(|e| e.id))
            .chain(ai_alerts().into_iter().map(|a| a.id))
            .collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn fixture_references_resolve() {
        let lines: HashSet<String> = production_lines().into_iter().map(|l| l.id).collect();
        for eq in equipment() {
            assert!(lines.contains(eq.production_line_id.as_deref().unwrap()));
        }
        let eq_ids: HashSet<String> = equipment().into_iter().map(|e| e.id).collect();
        for mo in maintenance_orders() {
            assert!(eq_ids.contains(mo.equipment_id.as_deref().unwrap()));
        }
    }
}
