//! The rule catalogue of the plant's QA templates.
//!
//! Each template id maps to a [`TemplateProfile`]: its ordered rules, where
//! its header keeps plant and season, and the values a new document starts
//! with. Rules run in the order listed here.

use std::sync::Arc;

use serde_json::{json, Value};

use super::percent::{
    ColumnPercentRow, CommercialRows, Denominator, ExportableSummary, RowPercent, UnitColumnsPercent,
    UnitPercentTable,
};
use super::stats::{
    ColumnTotalsRow, MatrixRowStats, Precision, RowStats, ScaledField, SummaryColumn, SummaryFields,
    SummaryOfSummaries, SummaryRow, ValueSource,
};
use super::tables::{
    LineAutofill, MatrixSeedLabel, MirrorFieldIntoRows, ResetOnChange, RowCountFromField, RowShape,
    SyncLabels, VarietySchema,
};
use super::{numbered, HeaderPaths, Rule, RuleRegistry, RuleSet, TemplateProfile};
use crate::aggregate::Aggregate;
use crate::row::MatrixLayout;

pub const PRE_HARVEST: &str = "REG.CKU.013";
pub const MATURITY_RECEPTION: &str = "REG.CKU.014";
pub const PACKING_PROJECTION: &str = "REG.CKU.015";
pub const PACKING: &str = "REG.CKU.017";
pub const PRESIZER: &str = "REG.CKU.018";
pub const CONTROLLED_ATMOSPHERE: &str = "REG.CKU.022";
pub const REG_027: &str = "REG.CKU.027";

const FRUIT_TYPE: &str = "MANZANA";
const SEED_COLOURS: [&str; 6] = ["sem_0", "sem_1_8", "sem_1_4", "sem_1_2", "sem_3_4", "sem_1"];

fn rule(r: impl Rule + 'static) -> Arc<dyn Rule> {
    Arc::new(r)
}

fn header(planta: &str, temporada: &str) -> HeaderPaths {
    HeaderPaths {
        planta: planta.to_string(),
        temporada: temporada.to_string(),
    }
}

fn defaults(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
    pairs.iter().map(|(path, value)| (path.to_string(), value.clone())).collect()
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Average, maximum and minimum into three scalar fields.
fn avg_max_min(source: ValueSource, avg: &'static str, max: &'static str, min: &'static str) -> SummaryFields {
    SummaryFields {
        source,
        outputs: vec![(Aggregate::Average, avg), (Aggregate::Max, max), (Aggregate::Min, min)],
        precision: Precision::Weight,
        require_samples: false,
    }
}

fn average_field(source: ValueSource, target: &'static str, precision: Precision) -> SummaryFields {
    SummaryFields {
        source,
        outputs: vec![(Aggregate::Average, target)],
        precision,
        require_samples: false,
    }
}

fn column_source(table: &'static str, names: &[&str]) -> ValueSource {
    ValueSource::Columns {
        table,
        columns: columns(names),
    }
}

/// Internal-market table: `N° frutos` column totals plus per-row averages.
fn internal_market() -> [Arc<dyn Rule>; 2] {
    [
        rule(ColumnTotalsRow {
            table: "tabla_mercado_interno",
            label_key: "defecto",
            total_label: "N° frutos",
            columns: numbered("f", 30),
            grand_total: Some("total_frutos_mercado_interno"),
        }),
        rule(RowStats {
            table: "tabla_mercado_interno",
            columns: numbered("f", 30),
            count: None,
            avg: "promedio_x",
            precision: Precision::Weight,
        }),
    ]
}

fn pre_harvest() -> TemplateProfile {
    let rules: RuleSet = vec![
        rule(ResetOnChange {
            watch: "variedad_rotulada_grupo",
            table: "matriz_categorias_calibre",
        }),
        rule(VarietySchema {
            group_path: "variedad_rotulada_grupo",
            table: "matriz_categorias_calibre",
        }),
        rule(SyncLabels {
            source: "matriz_frutos_externo",
            source_key: "calibre",
            target: "matriz_presiones",
            target_key: "calibre",
            shape: RowShape::Matrix(MatrixLayout::default()),
        }),
        rule(SyncLabels {
            source: "matriz_frutos_externo",
            source_key: "calibre",
            target: "matriz_color_semilla",
            target_key: "calibre",
            shape: RowShape::Cells(columns(&SEED_COLOURS)),
        }),
        rule(avg_max_min(
            ValueSource::Details {
                matrix: "matriz_presiones",
                layout: MatrixLayout::default(),
            },
            "presion_promedio",
            "presion_max",
            "presion_min",
        )),
        rule(average_field(
            column_source("matriz_presiones", &["brix"]),
            "sol_promedio",
            Precision::Fixed(1),
        )),
        rule(SyncLabels {
            source: "matriz_presiones",
            source_key: "calibre",
            target: "matriz_almidon_sol",
            target_key: "calibre",
            shape: RowShape::Cells(numbered("f", 10)),
        }),
        rule(SummaryRow {
            source: "matriz_color_semilla",
            columns: SEED_COLOURS.to_vec(),
            target: "suma_color_semilla",
        }),
        rule(average_field(
            column_source("matriz_frutos_externo", &["diametro"]),
            "promedio_diametro",
            Precision::Weight,
        )),
        rule(average_field(
            column_source("matriz_frutos_externo", &["peso"]),
            "promedio_peso",
            Precision::Weight,
        )),
        rule(average_field(
            column_source("matriz_color_cubrimiento", &["color_cubrimiento"]),
            "promedio_color_cubrimiento",
            Precision::Fixed(1),
        )),
        rule(ScaledField {
            source: "gasto_ml",
            factor: 0.067,
            precision: Precision::Fixed(3),
            target: "ac_malico_pct",
        }),
        rule(avg_max_min(
            ValueSource::Columns {
                table: "matriz_almidon_sol",
                columns: numbered("f", 10),
            },
            "almidon_promedio",
            "almidon_max",
            "almidon_min",
        )),
    ];
    TemplateProfile {
        rules,
        header: header("planta", "temporada"),
        defaults: defaults(&[("tipo_fruta", json!(FRUIT_TYPE))]),
    }
}

fn maturity_reception() -> TemplateProfile {
    let mut rules: RuleSet = Vec::new();
    for (source, table, size) in [
        ("tabla_parciales", "matriz_resumen_presiones_grande", "grande"),
        ("tabla_parciales_mediano", "matriz_resumen_presiones_mediano", "mediano"),
        ("tabla_parciales_chico", "matriz_resumen_presiones_chico", "chico"),
    ] {
        rules.push(rule(SummaryColumn {
            source: column_source(source, &["presion_1", "presion_2"]),
            table,
            column: size,
            precision: Precision::Weight,
        }));
    }
    rules.push(rule(SummaryOfSummaries {
        inputs: vec![
            ("matriz_resumen_presiones_grande", "grande"),
            ("matriz_resumen_presiones_mediano", "mediano"),
            ("matriz_resumen_presiones_chico", "chico"),
        ],
        table: "matriz_resumen_presion_general",
        column: "general",
        precision: Precision::Weight,
    }));
    for (source, size) in [("almidon_grande", "grande"), ("almidon_mediano", "mediano"), ("almidon_chico", "chico")] {
        rules.push(rule(SummaryColumn {
            source: column_source("parciales", &[source]),
            table: "matriz_resumen_almidon",
            column: size,
            precision: Precision::Weight,
        }));
    }
    rules.push(rule(SummaryOfSummaries {
        inputs: vec![
            ("matriz_resumen_almidon", "grande"),
            ("matriz_resumen_almidon", "mediano"),
            ("matriz_resumen_almidon", "chico"),
        ],
        table: "matriz_resumen_almidon_global",
        column: "global",
        precision: Precision::Weight,
    }));
    rules.push(rule(ColumnPercentRow {
        table: "matriz_corazon_acuoso",
        input_rows: 3,
        columns: numbered("g", 4),
        denominator: "identificacion.tamano_muestra",
        precision: Precision::Percent,
    }));
    rules.push(rule(RowPercent {
        source: "matriz_corazon_acuoso",
        rows: 3,
        columns: numbered("g", 4),
        target: "matriz_promedios_cor_acuoso",
        target_column: "promedio",
        denominator: "identificacion.tamano_muestra",
        precision: Precision::Percent,
    }));
    TemplateProfile {
        rules,
        header: header("encabezado.planta", "encabezado.temporada"),
        defaults: defaults(&[
            ("encabezado.tipo_fruta", json!(FRUIT_TYPE)),
            ("madurez.calibre", json!("GRANDE")),
            ("madurez_mediano.calibre", json!("MEDIANO")),
            ("madurez_chico.calibre", json!("CHICO")),
        ]),
    }
}

fn packing_projection() -> TemplateProfile {
    const SAMPLE: &str = "recepcion.tamano_muestra";
    let severity = vec![("leve_unidades", "leve_pct"), ("grave_unidades", "grave_pct")];
    let rules: RuleSet = vec![
        rule(ResetOnChange {
            watch: "recepcion.variedad_rotulada_grupo",
            table: "tabla_color_cubrimiento",
        }),
        rule(VarietySchema {
            group_path: "recepcion.variedad_rotulada_grupo",
            table: "tabla_color_cubrimiento",
        }),
        rule(UnitColumnsPercent {
            table: "danos_defectos",
            pairs: severity.clone(),
            denominator: SAMPLE,
            precision: Precision::Percent,
        }),
        rule(UnitColumnsPercent {
            table: "plagas_enfermedades",
            pairs: severity,
            denominator: SAMPLE,
            precision: Precision::Percent,
        }),
        rule(UnitColumnsPercent {
            table: "tabla_proyeccion_embalaje",
            pairs: vec![("n_frutos", "porcentaje")],
            denominator: SAMPLE,
            precision: Precision::Percent,
        }),
        rule(ExportableSummary {
            projection: "tabla_proyeccion_embalaje",
            label_key: "categoria",
            label: "Comercial",
            count_column: "n_frutos",
            target: "resumen_fruta_exportable",
            quantity_column: "cantidad_exportable",
            percent_column: "porcentaje_exportable",
            denominator: SAMPLE,
            precision: Precision::Percent,
        }),
    ];
    TemplateProfile {
        rules,
        header: header("encabezado.planta", "encabezado.temporada"),
        defaults: defaults(&[
            ("encabezado.tipo_fruta", json!(FRUIT_TYPE)),
            (SAMPLE, json!(50)),
        ]),
    }
}

fn packing() -> TemplateProfile {
    let damage_table = |table: &'static str| UnitPercentTable {
        table,
        label_key: "concepto",
        skip_labels: vec!["Comercial", "% Comercial", "Resolución"],
        columns: numbered("l", 30),
        denominator: Denominator::Field("calibre"),
        row_average: Some("promedio_fila"),
        precision: Precision::Percent,
    };
    let mut rules: RuleSet = vec![
        rule(MirrorFieldIntoRows {
            source: "calibre",
            table: "tabla_control_peso",
            column: "calibre",
            seed: vec![("n_cajas", json!(0)), ("promedio", json!(""))],
        }),
        rule(RowStats {
            table: "tabla_control_peso",
            columns: numbered("c", 10),
            count: Some("n_cajas"),
            avg: "promedio",
            precision: Precision::Weight,
        }),
        rule(average_field(
            ValueSource::Columns {
                table: "tabla_control_peso",
                columns: numbered("c", 10),
            },
            "promedio_pesos_general",
            Precision::Weight,
        )),
        rule(MatrixSeedLabel {
            source: "calibre",
            matrix: "presiones_por_calibre",
            layout: MatrixLayout::default(),
        }),
        rule(LineAutofill {
            table: "tabla_datos_linea",
            label_key: "concepto",
            trigger: "Productor",
            fills: vec![("Calibre", "calibre"), ("Categoría", "categoria")],
            columns: numbered("l", 30),
        }),
        rule(damage_table("tabla_danos_defectos")),
        rule(damage_table("tabla_fuera_categoria")),
        rule(CommercialRows {
            table: "tabla_danos_defectos",
            label_key: "concepto",
            comercial_label: "Comercial",
            percent_label: "% Comercial",
            excluded: vec!["Resolución"],
            columns: numbered("l", 30),
            denominator: Denominator::Field("calibre"),
            precision: Precision::Percent,
        }),
    ];
    rules.extend(internal_market());
    rules.push(rule(SummaryFields {
        require_samples: true,
        ..avg_max_min(
            ValueSource::Details {
                matrix: "presiones_por_calibre",
                layout: MatrixLayout::default(),
            },
            "presion_promedio",
            "presion_max",
            "presion_min",
        )
    }));
    TemplateProfile {
        rules,
        header: header("encabezado.planta", "temporada"),
        defaults: defaults(&[("encabezado.tipo_fruta", json!(FRUIT_TYPE))]),
    }
}

fn presizer() -> TemplateProfile {
    let per_channel = Denominator::ColumnRow {
        table: "tabla_datos_canal",
        label_key: "concepto",
        label: "Nº Frutos",
    };
    let channel_table = |table: &'static str| UnitPercentTable {
        table,
        label_key: "concepto",
        skip_labels: vec!["Comercial", "% Comercial", "Calibre", "% Calibre", "Resolución"],
        columns: numbered("ch", 50),
        denominator: per_channel.clone(),
        row_average: None,
        precision: Precision::Fixed(2),
    };
    let row_stats = |matrix: &'static str, layout: MatrixLayout| MatrixRowStats {
        matrix,
        layout,
        avg: Some("x"),
        max: Some("max"),
        min: Some("min"),
        precision: Precision::Weight,
    };
    let mut rules: RuleSet = vec![
        rule(RowCountFromField {
            count: "cant_te",
            table: "te",
            index_column: "n_tarja",
            cells: vec!["tarja_entrada"],
        }),
        rule(row_stats("matriz_presiones", MatrixLayout::default())),
        rule(row_stats("tabla_control_peso", MatrixLayout::weight())),
        rule(channel_table("tabla_fuera_categoria_canal")),
        rule(channel_table("tabla_danos_defectos_canal")),
        rule(CommercialRows {
            table: "tabla_danos_defectos_canal",
            label_key: "concepto",
            comercial_label: "Comercial",
            percent_label: "% Comercial",
            excluded: vec!["Calibre", "% Calibre", "Resolución"],
            columns: numbered("ch", 50),
            denominator: per_channel.clone(),
            precision: Precision::Fixed(2),
        }),
    ];
    rules.extend(internal_market());
    TemplateProfile {
        rules,
        header: header("planta", "temporada"),
        defaults: defaults(&[("tipo_fruta", json!(FRUIT_TYPE))]),
    }
}

fn controlled_atmosphere() -> TemplateProfile {
    TemplateProfile {
        rules: vec![rule(MatrixRowStats {
            matrix: "matriz_presiones",
            layout: MatrixLayout::default(),
            avg: Some("x"),
            max: None,
            min: None,
            precision: Precision::Weight,
        })],
        header: header("encabezado.planta", "encabezado.temporada"),
        defaults: defaults(&[("encabezado.tipo_fruta", json!(FRUIT_TYPE))]),
    }
}

fn reg_027() -> TemplateProfile {
    TemplateProfile {
        rules: Vec::new(),
        header: header("planta", "encabezado.temporada"),
        defaults: defaults(&[("tipo_fruta", json!(FRUIT_TYPE))]),
    }
}

/// Every registered template id with its profile.
pub fn all_profiles() -> Vec<(String, TemplateProfile)> {
    vec![
        (PRE_HARVEST.to_string(), pre_harvest()),
        (MATURITY_RECEPTION.to_string(), maturity_reception()),
        (PACKING_PROJECTION.to_string(), packing_projection()),
        (PACKING.to_string(), packing()),
        (PRESIZER.to_string(), presizer()),
        (CONTROLLED_ATMOSPHERE.to_string(), controlled_atmosphere()),
        (REG_027.to_string(), reg_027()),
    ]
}

pub fn standard_registry() -> RuleRegistry {
    all_profiles()
        .into_iter()
        .map(|(id, profile)| (id, Arc::new(profile)))
        .collect()
}
