use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::dates::parse_timestamp;

/// Etapas del pipeline de lavandería
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoProceso {
    Lavado,
    Secado,
    Doblado,
    Planchado,
    Tenido,
    Cc,
}

impl TipoProceso {
    pub const ALL: [TipoProceso; 6] = [
        TipoProceso::Lavado,
        TipoProceso::Secado,
        TipoProceso::Doblado,
        TipoProceso::Planchado,
        TipoProceso::Tenido,
        TipoProceso::Cc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TipoProceso::Lavado => "lavado",
            TipoProceso::Secado => "secado",
            TipoProceso::Doblado => "doblado",
            TipoProceso::Planchado => "planchado",
            TipoProceso::Tenido => "tenido",
            TipoProceso::Cc => "cc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tipo| tipo.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TipoProceso::Lavado => "Lavado",
            TipoProceso::Secado => "Secado",
            TipoProceso::Doblado => "Doblado",
            TipoProceso::Planchado => "Planchado",
            TipoProceso::Tenido => "Teñido",
            TipoProceso::Cc => "Control de calidad",
        }
    }
}

impl fmt::Display for TipoProceso {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color de marcado de un detalle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMarca {
    Rojo,
    Verde,
    Azul,
    Amarillo,
    Celeste,
    Blanco,
    Naranja,
    Morado,
    Rosado,
    Ninguno,
}

impl ColorMarca {
    /// Etiquetas desconocidas se tratan como "ninguno"
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "rojo" => ColorMarca::Rojo,
            "verde" => ColorMarca::Verde,
            "azul" => ColorMarca::Azul,
            "amarillo" => ColorMarca::Amarillo,
            "celeste" => ColorMarca::Celeste,
            "blanco" => ColorMarca::Blanco,
            "naranja" => ColorMarca::Naranja,
            "morado" => ColorMarca::Morado,
            "rosado" => ColorMarca::Rosado,
            _ => ColorMarca::Ninguno,
        }
    }

    /// Clase de color del tema para la vista
    pub fn css_class(&self) -> &'static str {
        match self {
            ColorMarca::Rojo => "red",
            ColorMarca::Verde => "green",
            ColorMarca::Azul => "indigo",
            ColorMarca::Amarillo => "yellow",
            ColorMarca::Celeste => "cyan-accent-2",
            ColorMarca::Blanco => "white",
            ColorMarca::Naranja => "orange-darken-2",
            ColorMarca::Morado => "purple",
            ColorMarca::Rosado => "pink-lighten-4",
            ColorMarca::Ninguno => "grey-lighten-3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Maquina {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub tipo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponsableDto {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub nombres: String,
    #[serde(default)]
    pub apellidos: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sede {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub nombre: String,
}

/// Línea de un proceso; solo existe dentro de su proceso padre
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detalle {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub num_orden: Option<String>,
    #[serde(default)]
    pub maquina: Option<Maquina>,
    #[serde(default)]
    pub cantidad: Option<f64>,
    #[serde(default)]
    pub color_marcado: Option<String>,
    #[serde(alias = "obs", default)]
    pub observaciones: Option<String>,
    #[serde(default)]
    pub estado: bool,
    #[serde(default)]
    pub fecha_creacion: Option<String>,
    #[serde(default)]
    pub fecha_actualizacion: Option<String>,
}

impl Detalle {
    pub fn color(&self) -> ColorMarca {
        self.color_marcado
            .as_deref()
            .map_or(ColorMarca::Ninguno, ColorMarca::parse)
    }
}

/// Proceso tal como llega de la API
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcesoDto {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub tipo: String,
    #[serde(alias = "fechaYHora", default)]
    pub fecha: Option<String>,
    #[serde(default)]
    pub responsable: Option<ResponsableDto>,
    #[serde(default)]
    pub sede: Option<Sede>,
    #[serde(default)]
    pub estado: bool,
    /// ID de la operación o el objeto poblado
    #[serde(default)]
    pub operacion: Option<Value>,
    #[serde(default)]
    pub detalles: Option<Vec<Detalle>>,
}

impl ProcesoDto {
    pub fn operacion_id(&self) -> Option<String> {
        match self.operacion.as_ref()? {
            Value::String(id) => Some(id.clone()),
            Value::Object(map) => map.get("_id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Responsable {
    pub id: String,
    pub nombre: String,
    pub nombres: String,
    pub apellidos: String,
}

impl From<&ResponsableDto> for Responsable {
    fn from(dto: &ResponsableDto) -> Self {
        Self {
            id: dto.id.clone(),
            nombre: format!("{} {}", dto.nombres, dto.apellidos).trim().to_string(),
            nombres: dto.nombres.clone(),
            apellidos: dto.apellidos.clone(),
        }
    }
}

/// Proceso normalizado para la caché (resumen sin detalles)
#[derive(Debug, Clone, PartialEq)]
pub struct Proceso {
    pub id: String,
    pub tipo: TipoProceso,
    pub fecha: String,
    pub fecha_ms: Option<i64>,
    pub responsable: Option<Responsable>,
    pub sede: Option<Sede>,
    pub estado: bool,
    pub operacion: Option<String>,
    pub detalles_count: usize,
    pub completed_count: usize,
    pub progreso: u32,
    pub last_updated: i64,
}

impl Proceso {
    /// None si el tipo no pertenece al pipeline conocido
    pub fn from_dto(dto: &ProcesoDto, now_ms: i64) -> Option<Self> {
        let tipo = TipoProceso::parse(&dto.tipo)?;
        let fecha = dto.fecha.clone().unwrap_or_default();
        let (detalles_count, completed_count) = dto.detalles.as_ref().map_or((0, 0), |detalles| {
            (detalles.len(), detalles.iter().filter(|d| d.estado).count())
        });

        Some(Self {
            id: dto.id.clone(),
            tipo,
            fecha_ms: parse_timestamp(&fecha),
            fecha,
            responsable: dto.responsable.as_ref().map(Responsable::from),
            sede: dto.sede.clone(),
            estado: dto.estado,
            operacion: dto.operacion_id(),
            detalles_count,
            completed_count,
            progreso: percentage(completed_count, detalles_count),
            last_updated: now_ms,
        })
    }
}

/// Proceso con sus detalles cargados bajo demanda
#[derive(Debug, Clone, PartialEq)]
pub struct ProcesoDetails {
    pub proceso: Proceso,
    pub detalles: Vec<Detalle>,
    pub last_fetch: i64,
}

impl ProcesoDetails {
    pub fn from_dto(dto: &ProcesoDto, now_ms: i64) -> Option<Self> {
        Some(Self {
            proceso: Proceso::from_dto(dto, now_ms)?,
            detalles: dto.detalles.clone().unwrap_or_default(),
            last_fetch: now_ms,
        })
    }

    pub fn detalle(&self, detalle_id: &str) -> Option<&Detalle> {
        self.detalles.iter().find(|d| d.id == detalle_id)
    }

    /// Recalcula contadores y progreso tras mutar detalles
    pub fn refresh_counts(&mut self) {
        self.proceso.detalles_count = self.detalles.len();
        self.proceso.completed_count = self.detalles.iter().filter(|d| d.estado).count();
        self.proceso.progreso = percentage(self.proceso.completed_count, self.proceso.detalles_count);
    }
}

/// Cambio de estado de un detalle dentro de un lote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetalleStatusUpdate {
    pub detalle_id: String,
    pub estado: bool,
}

/// Porcentaje entero redondeado; 0 si no hay total
pub fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as u32
    }
}
