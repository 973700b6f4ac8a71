use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::proceso::{Detalle, ResponsableDto};
use crate::utils::dates::{format_lima, parse_timestamp};

/// Proceso anidado en la respuesta de /operacion
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperacionProcesoDto {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub tipo: String,
    #[serde(alias = "fechaYHora", default)]
    pub fecha: Option<String>,
    #[serde(default)]
    pub responsable: Option<ResponsableDto>,
    #[serde(default)]
    pub detalles: Option<Vec<Detalle>>,
}

/// Operación tal como llega de la API
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperacionDto {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub procesos: Option<Vec<OperacionProcesoDto>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub fec_inicio: Option<String>,
    #[serde(default)]
    pub fec_final: Option<String>,
    #[serde(default)]
    pub estado_operacion: bool,
    #[serde(default)]
    pub current_stage: Option<String>,
}

impl OperacionDto {
    /// Números de orden únicos de todos los detalles, en orden de aparición
    pub fn all_tickets(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut tickets = Vec::new();
        for proceso in self.procesos.iter().flatten() {
            for detalle in proceso.detalles.iter().flatten() {
                if let Some(orden) = detalle.num_orden.as_deref().filter(|o| !o.is_empty()) {
                    if seen.insert(orden.to_string()) {
                        tickets.push(orden.to_string());
                    }
                }
            }
        }
        tickets
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperacionProceso {
    pub id: String,
    pub tipo: String,
    pub fecha: String,
    pub responsable: String,
    pub detalles: Option<Vec<Detalle>>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fechas {
    pub fec_creacion: String,
    pub inicio: String,
    pub final_: String,
    pub inicio_ms: Option<i64>,
    pub final_ms: Option<i64>,
}

/// Operación normalizada para la caché
#[derive(Debug, Clone, PartialEq)]
pub struct Operacion {
    pub id: String,
    pub ordenes: Vec<String>,
    pub procesos: Vec<OperacionProceso>,
    pub fechas: Fechas,
    pub created_ms: i64,
    pub estado_operacion: bool,
    pub current_stage: Option<String>,
    pub has_full_details: bool,
    pub last_updated: i64,
}

impl Operacion {
    pub fn from_dto(dto: &OperacionDto, include_full_details: bool, now_ms: i64) -> Self {
        let procesos = dto
            .procesos
            .iter()
            .flatten()
            .map(|proceso| {
                let fecha = proceso.fecha.clone().unwrap_or_default();
                OperacionProceso {
                    id: proceso.id.clone(),
                    tipo: proceso.tipo.clone(),
                    fecha: format_lima(&fecha).unwrap_or(fecha),
                    responsable: proceso.responsable.as_ref().map_or_else(
                        || "No asignado".to_string(),
                        |r| format!("{} {}", r.nombres, r.apellidos),
                    ),
                    detalles: if include_full_details { proceso.detalles.clone() } else { None },
                }
            })
            .collect();

        let created = dto.created_at.clone().unwrap_or_default();
        let inicio = dto.fec_inicio.clone().unwrap_or_default();
        let final_ = dto.fec_final.clone().unwrap_or_default();

        Self {
            id: dto.id.clone(),
            ordenes: dto.all_tickets(),
            procesos,
            created_ms: parse_timestamp(&created).unwrap_or(0),
            fechas: Fechas {
                inicio_ms: parse_timestamp(&inicio),
                final_ms: parse_timestamp(&final_),
                fec_creacion: created,
                inicio: format_lima(&inicio).unwrap_or(inicio),
                final_: format_lima(&final_).unwrap_or(final_),
            },
            estado_operacion: dto.estado_operacion,
            current_stage: dto.current_stage.clone().filter(|s| !s.is_empty()),
            has_full_details: include_full_details,
            last_updated: now_ms,
        }
    }

    /// Copia degradada sin detalles completos (fallback ante error)
    pub fn without_full_details(&self) -> Self {
        let mut copy = self.clone();
        for proceso in &mut copy.procesos {
            proceso.detalles.get_or_insert_with(Vec::new);
        }
        copy.has_full_details = false;
        copy
    }
}

/// Cambios parciales aplicables a una operación cacheada
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperacionPatch {
    pub estado_operacion: Option<bool>,
    pub current_stage: Option<Option<String>>,
    pub ordenes: Option<Vec<String>>,
}

impl OperacionPatch {
    pub fn apply(&self, operacion: &mut Operacion) {
        if let Some(estado) = self.estado_operacion {
            operacion.estado_operacion = estado;
        }
        if let Some(stage) = &self.current_stage {
            operacion.current_stage = stage.clone();
        }
        if let Some(ordenes) = &self.ordenes {
            operacion.ordenes = ordenes.clone();
        }
    }
}
