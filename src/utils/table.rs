// Combinación de filas para la tabla de detalles (rowspan)

use crate::models::proceso::Detalle;

/// Fila con rowspans; -1 indica celda absorbida por una fila anterior
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub detalle: Detalle,
    pub rowspan_orden: i32,
    pub rowspan_maquina: i32,
}

/// Combina filas consecutivas con el mismo número de orden y la misma máquina
pub fn merge_table_rows(detalles: &[Detalle]) -> Vec<MergedRow> {
    let mut merged: Vec<MergedRow> = Vec::with_capacity(detalles.len());
    let mut prev_orden: Option<&str> = None;
    let mut prev_maquina: Option<&str> = None;
    let mut anchor_orden = 0;
    let mut anchor_maquina = 0;

    for detalle in detalles {
        let mut row = MergedRow { detalle: detalle.clone(), rowspan_orden: 1, rowspan_maquina: 1 };

        let (Some(orden), Some(maquina)) = (
            detalle.num_orden.as_deref(),
            detalle.maquina.as_ref().map(|m| m.nombre.as_str()),
        ) else {
            merged.push(row);
            continue;
        };

        if prev_orden == Some(orden) {
            merged[anchor_orden].rowspan_orden += 1;
            row.rowspan_orden = -1;
        } else {
            prev_orden = Some(orden);
            anchor_orden = merged.len();
        }

        if prev_maquina == Some(maquina) {
            merged[anchor_maquina].rowspan_maquina += 1;
            row.rowspan_maquina = -1;
        } else {
            prev_maquina = Some(maquina);
            anchor_maquina = merged.len();
        }

        merged.push(row);
    }

    merged
}
