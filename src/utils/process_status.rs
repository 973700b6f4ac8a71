// ============================================================================
// ESTADO DE PROCESOS - Cálculo y validación a partir de los detalles
// ============================================================================

use std::cmp::Ordering;

use crate::models::proceso::{percentage, Detalle};

/// Estado agregado de un proceso
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessStatus {
    pub estado: bool,
    pub completed_count: usize,
    pub total_count: usize,
    pub completion_percentage: u32,
    pub status_text: String,
    pub is_partially_complete: bool,
}

pub fn calculate_process_status(detalles: &[Detalle]) -> ProcessStatus {
    if detalles.is_empty() {
        return ProcessStatus {
            estado: false,
            completed_count: 0,
            total_count: 0,
            completion_percentage: 0,
            status_text: "Sin detalles".to_string(),
            is_partially_complete: false,
        };
    }

    let total_count = detalles.len();
    let completed_count = detalles.iter().filter(|d| d.estado).count();
    let all_completed = completed_count == total_count;

    let status_text = if all_completed {
        "Finalizado".to_string()
    } else if completed_count == 0 {
        "Pendiente".to_string()
    } else {
        format!("En progreso ({}/{})", completed_count, total_count)
    };

    ProcessStatus {
        estado: all_completed,
        completed_count,
        total_count,
        completion_percentage: percentage(completed_count, total_count),
        status_text,
        is_partially_complete: completed_count > 0 && !all_completed,
    }
}

/// Color del tema según el estado
pub fn status_color(status: &ProcessStatus) -> &'static str {
    if status.estado {
        "success"
    } else if status.is_partially_complete {
        "warning"
    } else {
        "error"
    }
}

pub fn can_complete_process(detalles: &[Detalle]) -> bool {
    !detalles.is_empty() && detalles.iter().all(|d| d.estado)
}

pub fn next_action_suggestion(status: &ProcessStatus) -> String {
    if status.estado {
        return "Proceso completado".to_string();
    }
    if status.is_partially_complete {
        let remaining = status.total_count - status.completed_count;
        let plural = if remaining > 1 { "s" } else { "" };
        return format!("Completar {} detalle{} restante{}", remaining, plural, plural);
    }
    "Iniciar procesamiento de detalles".to_string()
}

/// Valida un cambio de estado; devuelve todos los errores encontrados
pub fn validate_status_change(detalle: Option<&Detalle>, new_status: bool) -> Result<(), Vec<String>> {
    let Some(detalle) = detalle else {
        return Err(vec!["Detalle no encontrado".to_string()]);
    };
    if detalle.estado == new_status {
        return Err(vec!["El estado no ha cambiado".to_string()]);
    }

    let mut errors = Vec::new();
    if detalle.num_orden.as_deref().map_or(true, str::is_empty) {
        errors.push("Detalle sin número de orden".to_string());
    }
    if detalle.cantidad.map_or(true, |cantidad| cantidad <= 0.0) {
        errors.push("Detalle sin cantidad válida".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Pendientes primero; a igual estado, por número de orden
pub fn sort_details_by_status(detalles: &[Detalle]) -> Vec<Detalle> {
    let mut sorted = detalles.to_vec();
    sorted.sort_by(|a, b| match (a.estado, b.estado) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        _ => a
            .num_orden
            .as_deref()
            .unwrap_or_default()
            .cmp(b.num_orden.as_deref().unwrap_or_default()),
    });
    sorted
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedDetails {
    pub pending: Vec<Detalle>,
    pub completed: Vec<Detalle>,
}

pub fn group_details_by_status(detalles: &[Detalle]) -> GroupedDetails {
    let (completed, pending) = detalles.iter().cloned().partition(|d| d.estado);
    GroupedDetails { pending, completed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detalle(id: &str, orden: &str, estado: bool) -> Detalle {
        Detalle {
            id: id.to_string(),
            num_orden: Some(orden.to_string()),
            cantidad: Some(2.0),
            estado,
            ..Default::default()
        }
    }

    #[test]
    fn test_status_texts() {
        assert_eq!(calculate_process_status(&[]).status_text, "Sin detalles");

        let partial = calculate_process_status(&[detalle("a", "1", true), detalle("b", "2", false), detalle("c", "3", false)]);
        assert_eq!(partial.status_text, "En progreso (1/3)");
        assert_eq!(partial.completion_percentage, 33);
        assert!(partial.is_partially_complete);
        assert_eq!(next_action_suggestion(&partial), "Completar 2 detalles restantes");
        assert_eq!(status_color(&partial), "warning");

        let done = calculate_process_status(&[detalle("a", "1", true)]);
        assert!(done.estado);
        assert_eq!(done.status_text, "Finalizado");
        assert_eq!(next_action_suggestion(&done), "Proceso completado");

        let pending = calculate_process_status(&[detalle("a", "1", false)]);
        assert_eq!(pending.status_text, "Pendiente");
        assert_eq!(next_action_suggestion(&pending), "Iniciar procesamiento de detalles");
    }

    #[test]
    fn test_validate_status_change_collects_field_errors() {
        assert_eq!(validate_status_change(None, true), Err(vec!["Detalle no encontrado".to_string()]));

        let ok = detalle("a", "NO1", false);
        assert_eq!(validate_status_change(Some(&ok), false), Err(vec!["El estado no ha cambiado".to_string()]));
        assert!(validate_status_change(Some(&ok), true).is_ok());

        let incomplete = Detalle { id: "b".into(), cantidad: Some(0.0), ..Default::default() };
        assert_eq!(
            validate_status_change(Some(&incomplete), true),
            Err(vec!["Detalle sin número de orden".to_string(), "Detalle sin cantidad válida".to_string()])
        );
    }

    #[test]
    fn test_sort_and_group() {
        let detalles = vec![detalle("a", "3", true), detalle("b", "2", false), detalle("c", "1", false)];
        let ids: Vec<_> = sort_details_by_status(&detalles).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let grouped = group_details_by_status(&detalles);
        assert_eq!((grouped.pending.len(), grouped.completed.len()), (2, 1));
        assert!(!can_complete_process(&detalles));
        assert!(!can_complete_process(&[]));
    }
}
