//! End-to-end scenarios for each registered template.

use fruitqa_engine::{Engine, Session, Template, TemplateRegistry};
use fruitqa_util::SequentialRowIds;
use serde_json::{json, Value};

fn start_template(template: Value) -> Session {
    let template: Template = serde_json::from_value(template).unwrap();
    let id = template.id.clone();
    let mut templates = TemplateRegistry::new();
    templates.insert(template);
    Engine::new(templates)
        .start_with_ids(&id, Box::new(SequentialRowIds::default()))
        .unwrap()
}

fn start(template_id: &str) -> Session {
    start_template(json!({"id": template_id, "title": template_id, "sections": []}))
}

fn at<'a>(session: &'a Session, path: &str) -> &'a Value {
    fruitqa_path::get_path(session.data(), path).unwrap_or(&Value::Null)
}

fn grid(key: &str) -> Value {
    json!({
        "key": key,
        "label": key,
        "type": "dynamic_table",
        "initialRows": [{"estadistico": "Promedio"}, {"estadistico": "Máximo"}, {"estadistico": "Mínimo"}]
    })
}

// ---- REG.CKU.013 pre-harvest

#[test]
fn test_pre_harvest_header_and_defaults() {
    let s = start("REG.CKU.013");
    assert_eq!(s.data()["planta"], json!("Teno"));
    assert_eq!(s.data()["temporada"], json!("25-26"));
    assert_eq!(s.data()["tipo_fruta"], json!("MANZANA"));
    assert!(s.is_dirty());
}

#[test]
fn test_pre_harvest_starch_and_brix() {
    let mut s = start("REG.CKU.013");
    s.set_field("matriz_frutos_externo", json!([{"calibre": "70"}, {"calibre": "80"}]))
        .unwrap();
    s.set_field("matriz_presiones.0.brix", json!(12)).unwrap();
    s.set_field("matriz_presiones.1.brix", json!("13.4")).unwrap();
    assert_eq!(at(&s, "sol_promedio"), &json!(12.7));

    s.set_field("matriz_almidon_sol.0.f1", json!(2)).unwrap();
    s.set_field("matriz_almidon_sol.1.f3", json!(5)).unwrap();
    assert_eq!(at(&s, "almidon_promedio"), &json!(3.5));
    assert_eq!(at(&s, "almidon_max"), &json!(5));
    assert_eq!(at(&s, "almidon_min"), &json!(2));
}

// ---- REG.CKU.014 maturity at reception

fn maturity_template() -> Value {
    json!({
        "id": "REG.CKU.014",
        "title": "Madurez en recepción",
        "sections": [{
            "key": "resumen",
            "title": "Resumen",
            "fields": [
                grid("matriz_resumen_presiones_grande"),
                grid("matriz_resumen_presiones_mediano"),
                grid("matriz_resumen_presiones_chico"),
                grid("matriz_resumen_presion_general"),
                {
                    "key": "matriz_corazon_acuoso",
                    "label": "Corazón acuoso",
                    "type": "dynamic_table",
                    "initialRows": [{"nivel": "Leve"}, {"nivel": "Moderado"}, {"nivel": "Severo"}, {"nivel": "%"}]
                },
                {
                    "key": "matriz_promedios_cor_acuoso",
                    "label": "Promedios",
                    "type": "dynamic_table",
                    "initialRows": [{"nivel": "Leve"}, {"nivel": "Moderado"}, {"nivel": "Severo"}]
                }
            ]
        }]
    })
}

#[test]
fn test_maturity_initial_rows_are_hydrated() {
    let s = start_template(maturity_template());
    let rows = s.data()["matriz_resumen_presiones_grande"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row["_id"].is_string()));
    assert_eq!(s.data()["encabezado"]["planta"], json!("Teno"));
    assert_eq!(s.data()["madurez_chico"]["calibre"], json!("CHICO"));
}

#[test]
fn test_maturity_pressure_grids() {
    let mut s = start_template(maturity_template());
    s.set_field(
        "tabla_parciales",
        json!([{"presion_1": 14, "presion_2": 15}, {"presion_1": 16, "presion_2": ""}]),
    )
    .unwrap();
    assert_eq!(at(&s, "matriz_resumen_presiones_grande.0.grande"), &json!(15));
    assert_eq!(at(&s, "matriz_resumen_presiones_grande.1.grande"), &json!(16));
    assert_eq!(at(&s, "matriz_resumen_presiones_grande.2.grande"), &json!(14));
    // no medium samples
    assert_eq!(at(&s, "matriz_resumen_presiones_mediano.0.mediano"), &json!(""));

    s.set_field("tabla_parciales_mediano", json!([{"presion_1": 12, "presion_2": 12.5}]))
        .unwrap();
    assert_eq!(at(&s, "matriz_resumen_presiones_mediano.0.mediano"), &json!(12.25));
    // average of averages, max of maxima, min of minima
    assert_eq!(at(&s, "matriz_resumen_presion_general.0.general"), &json!(13.63));
    assert_eq!(at(&s, "matriz_resumen_presion_general.1.general"), &json!(16));
    assert_eq!(at(&s, "matriz_resumen_presion_general.2.general"), &json!(12));
}

#[test]
fn test_maturity_watercore_percentages() {
    let mut s = start_template(maturity_template());
    s.set_field("identificacion.tamano_muestra", json!(20)).unwrap();
    s.set_field("matriz_corazon_acuoso.0.g1", json!(2)).unwrap();
    s.set_field("matriz_corazon_acuoso.0.g2", json!(1)).unwrap();
    s.set_field("matriz_corazon_acuoso.1.g1", json!(1)).unwrap();

    assert_eq!(at(&s, "matriz_corazon_acuoso.3.g1"), &json!(15));
    assert_eq!(at(&s, "matriz_corazon_acuoso.3.g2"), &json!(5));
    assert_eq!(at(&s, "matriz_corazon_acuoso.3.g3"), &json!(""));
    assert_eq!(at(&s, "matriz_promedios_cor_acuoso.0.promedio"), &json!(15));
    assert_eq!(at(&s, "matriz_promedios_cor_acuoso.1.promedio"), &json!(5));
    assert_eq!(at(&s, "matriz_promedios_cor_acuoso.2.promedio"), &json!(""));

    s.set_field("identificacion.tamano_muestra", json!("")).unwrap();
    assert_eq!(at(&s, "matriz_corazon_acuoso.3.g1"), &json!(""));
}

// ---- REG.CKU.015 packing projection

#[test]
fn test_projection_exportable_summary() {
    let mut s = start("REG.CKU.015");
    s.set_field("resumen_fruta_exportable", json!([{"_id": "x"}])).unwrap();
    assert_eq!(at(&s, "resumen_fruta_exportable.0.cantidad_exportable"), &json!(""));

    s.set_field("tabla_proyeccion_embalaje", json!([{"categoria": "Comercial", "n_frutos": 12}]))
        .unwrap();
    assert_eq!(at(&s, "tabla_proyeccion_embalaje.0.porcentaje"), &json!(24));
    assert_eq!(at(&s, "resumen_fruta_exportable.0.cantidad_exportable"), &json!(38));
    assert_eq!(at(&s, "resumen_fruta_exportable.0.porcentaje_exportable"), &json!(76));
}

#[test]
fn test_projection_pests_use_sample_size() {
    let mut s = start("REG.CKU.015");
    s.set_field("plagas_enfermedades", json!([{"leve_unidades": "", "grave_unidades": 1}]))
        .unwrap();
    assert_eq!(at(&s, "plagas_enfermedades.0.grave_pct"), &json!(2));
    assert_eq!(at(&s, "plagas_enfermedades.0.leve_pct"), &json!(""));
}

// ---- REG.CKU.017 packing

#[test]
fn test_packing_weight_control() {
    let mut s = start("REG.CKU.017");
    s.set_field("calibre", json!("100")).unwrap();
    assert_eq!(at(&s, "tabla_control_peso.0.calibre"), &json!("100"));
    assert_eq!(at(&s, "tabla_control_peso.0.n_cajas"), &json!(0));
    assert_eq!(at(&s, "tabla_control_peso.0.promedio"), &json!(""));
    assert_eq!(at(&s, "presiones_por_calibre.0.calibre"), &json!("100"));

    s.set_field("tabla_control_peso.0.c1", json!(18.2)).unwrap();
    s.set_field("tabla_control_peso.0.c2", json!("18.4")).unwrap();
    assert_eq!(at(&s, "tabla_control_peso.0.n_cajas"), &json!(2));
    assert_eq!(at(&s, "tabla_control_peso.0.promedio"), &json!(18.3));
    assert_eq!(at(&s, "promedio_pesos_general"), &json!(18.3));

    s.set_field("calibre", json!("110")).unwrap();
    assert_eq!(at(&s, "tabla_control_peso.0.calibre"), &json!("110"));
    assert_eq!(at(&s, "presiones_por_calibre.0.calibre"), &json!("110"));
}

#[test]
fn test_packing_pressures_need_declared_samples() {
    let mut s = start("REG.CKU.017");
    s.set_field("calibre", json!("100")).unwrap();
    s.set_field("presiones_por_calibre.0.detalles", json!([{"_id": "d", "p1": 15, "p2": 16}]))
        .unwrap();
    assert_eq!(at(&s, "presion_promedio"), &json!(""));

    s.set_field("presiones_por_calibre.0.n_frutos", json!(1)).unwrap();
    assert_eq!(at(&s, "presion_promedio"), &json!(15.5));
    assert_eq!(at(&s, "presion_max"), &json!(16));
    assert_eq!(at(&s, "presion_min"), &json!(15));
}

#[test]
fn test_packing_seed_entry_removed_without_calibre() {
    let mut s = start("REG.CKU.017");
    s.set_field("calibre", json!("100")).unwrap();
    assert_eq!(s.data()["presiones_por_calibre"].as_array().unwrap().len(), 1);
    s.set_field("calibre", json!("")).unwrap();
    assert_eq!(s.data()["presiones_por_calibre"], json!([]));
}

#[test]
fn test_packing_commercial_rows() {
    let mut s = start("REG.CKU.017");
    s.set_field("calibre", json!(50)).unwrap();
    s.set_field(
        "tabla_danos_defectos",
        json!([
            {"_id": "a", "concepto": "Golpe", "l1": 5},
            {"_id": "b", "concepto": "Russet", "l1": 10},
            {"_id": "c", "concepto": "Resolución", "l1": "A"},
            {"_id": "d", "concepto": "Comercial"},
            {"_id": "e", "concepto": "% Comercial"}
        ]),
    )
    .unwrap();
    assert_eq!(at(&s, "tabla_danos_defectos.0.l1"), &json!(10));
    assert_eq!(at(&s, "tabla_danos_defectos.1.l1"), &json!(20));
    assert_eq!(at(&s, "tabla_danos_defectos.2.l1"), &json!("A"));
    assert_eq!(at(&s, "tabla_danos_defectos.3.l1"), &json!(15));
    assert_eq!(at(&s, "tabla_danos_defectos.4.l1"), &json!(30));
    assert_eq!(at(&s, "tabla_danos_defectos.3.l2"), &json!(""));
    assert_eq!(at(&s, "tabla_danos_defectos.4.l2"), &json!(""));

    // rebased cells still add up to the same units
    s.set_field("calibre", json!(100)).unwrap();
    assert_eq!(at(&s, "tabla_danos_defectos.0.l1"), &json!(5));
    assert_eq!(at(&s, "tabla_danos_defectos.3.l1"), &json!(15));
    assert_eq!(at(&s, "tabla_danos_defectos.4.l1"), &json!(15));
}

#[test]
fn test_packing_line_autofill() {
    let mut s = start("REG.CKU.017");
    s.set_field("calibre", json!("100")).unwrap();
    s.set_field("categoria", json!("XFancy")).unwrap();
    s.set_field(
        "tabla_datos_linea",
        json!([
            {"_id": "p", "concepto": "Productor", "l1": ""},
            {"_id": "c", "concepto": "Calibre", "l1": ""},
            {"_id": "k", "concepto": "Categoría", "l1": ""}
        ]),
    )
    .unwrap();
    assert_eq!(at(&s, "tabla_datos_linea.1.l1"), &json!(""));

    s.set_field("tabla_datos_linea.0.l1", json!("Agrícola Sur")).unwrap();
    assert_eq!(at(&s, "tabla_datos_linea.1.l1"), &json!("100"));
    assert_eq!(at(&s, "tabla_datos_linea.2.l1"), &json!("XFancy"));
    assert_eq!(at(&s, "tabla_datos_linea.1.l2"), &Value::Null);

    // a manual override sticks until the producer cell is edited again
    s.set_field("tabla_datos_linea.1.l1", json!("90")).unwrap();
    assert_eq!(at(&s, "tabla_datos_linea.1.l1"), &json!("90"));

    s.set_field("tabla_datos_linea.0.l1", json!("")).unwrap();
    assert_eq!(at(&s, "tabla_datos_linea.1.l1"), &json!(""));
    assert_eq!(at(&s, "tabla_datos_linea.2.l1"), &json!(""));
}

#[test]
fn test_packing_internal_market() {
    let mut s = start("REG.CKU.017");
    s.set_field(
        "tabla_mercado_interno",
        json!([
            {"_id": "a", "defecto": "Golpe", "f1": 2, "f2": 3},
            {"_id": "b", "defecto": "Russet", "f1": 1},
            {"_id": "t", "defecto": "N° frutos"}
        ]),
    )
    .unwrap();
    assert_eq!(at(&s, "tabla_mercado_interno.2.f1"), &json!(3));
    assert_eq!(at(&s, "tabla_mercado_interno.2.f2"), &json!(3));
    assert_eq!(at(&s, "tabla_mercado_interno.2.f3"), &json!(""));
    assert_eq!(at(&s, "total_frutos_mercado_interno"), &json!(6));
    assert_eq!(at(&s, "tabla_mercado_interno.0.promedio_x"), &json!(2.5));
    assert_eq!(at(&s, "tabla_mercado_interno.1.promedio_x"), &json!(1));
}

// ---- REG.CKU.018 presizer

#[test]
fn test_presizer_tarja_rows_follow_count() {
    let mut s = start("REG.CKU.018");
    assert!(s.data().get("te").is_none() || s.data()["te"] == json!([]));

    s.set_field("cant_te", json!(3)).unwrap();
    let rows = s.data()["te"].as_array().unwrap().clone();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2]["n_tarja"], json!("3"));
    assert_eq!(rows[2]["tarja_entrada"], json!(""));
    assert_eq!(rows[2]["_isFixed"], json!(true));

    s.set_field("te.0.tarja_entrada", json!("T-881")).unwrap();
    s.set_field("cant_te", json!(1)).unwrap();
    let kept = s.data()["te"].as_array().unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0]["_id"], rows[0]["_id"]);
    assert_eq!(kept[0]["tarja_entrada"], json!("T-881"));

    // not a count: left alone
    s.set_field("cant_te", json!("tres")).unwrap();
    assert_eq!(s.data()["te"].as_array().unwrap().len(), 1);

    // nor is an absurd one
    s.set_field("cant_te", json!(1e12)).unwrap();
    assert_eq!(s.data()["te"].as_array().unwrap().len(), 1);
}

#[test]
fn test_presizer_matrix_row_stats() {
    let mut s = start("REG.CKU.018");
    s.set_field(
        "matriz_presiones",
        json!([{"_id": "a", "calibre": "100", "detalles": [{"p1": 14, "p2": 15}, {"p1": 16, "p2": ""}]}]),
    )
    .unwrap();
    assert_eq!(at(&s, "matriz_presiones.0.x"), &json!(15));
    assert_eq!(at(&s, "matriz_presiones.0.max"), &json!(16));
    assert_eq!(at(&s, "matriz_presiones.0.min"), &json!(14));

    // weight mode reads one value per fruit
    s.set_field(
        "tabla_control_peso",
        json!([{"_id": "w", "calibre": "100", "detalles": [{"p1": 180}, {"p1": 190, "p2": 999}]}]),
    )
    .unwrap();
    assert_eq!(at(&s, "tabla_control_peso.0.x"), &json!(185));
    assert_eq!(at(&s, "tabla_control_peso.0.max"), &json!(190));
}

#[test]
fn test_presizer_channel_tables() {
    let mut s = start("REG.CKU.018");
    s.set_field(
        "tabla_datos_canal",
        json!([{"_id": "n", "concepto": "Nº Frutos", "ch1": 40, "ch2": 0}]),
    )
    .unwrap();
    s.set_field(
        "tabla_danos_defectos_canal",
        json!([
            {"_id": "a", "concepto": "Golpe", "ch1": 3, "ch2": 2},
            {"_id": "c", "concepto": "Comercial"},
            {"_id": "p", "concepto": "% Comercial"}
        ]),
    )
    .unwrap();
    assert_eq!(at(&s, "tabla_danos_defectos_canal.0.ch1"), &json!(7.5));
    // no fruit count for the channel: raw units
    assert_eq!(at(&s, "tabla_danos_defectos_canal.0.ch2"), &json!(2));
    assert_eq!(at(&s, "tabla_danos_defectos_canal.1.ch1"), &json!(3));
    assert_eq!(at(&s, "tabla_danos_defectos_canal.2.ch1"), &json!(7.5));
    assert_eq!(at(&s, "tabla_danos_defectos_canal.1.ch2"), &json!(2));
    assert_eq!(at(&s, "tabla_danos_defectos_canal.2.ch2"), &json!(""));

    s.set_field("tabla_datos_canal.0.ch1", json!(30)).unwrap();
    assert_eq!(at(&s, "tabla_danos_defectos_canal.0.ch1"), &json!(10));
    assert_eq!(at(&s, "tabla_danos_defectos_canal.1.ch1"), &json!(3));
    assert_eq!(at(&s, "tabla_danos_defectos_canal.2.ch1"), &json!(10));
}

// ---- REG.CKU.022 and REG.CKU.027

#[test]
fn test_controlled_atmosphere_average_only() {
    let mut s = start("REG.CKU.022");
    s.set_field(
        "matriz_presiones",
        json!([{"_id": "a", "calibre": "80", "detalles": [{"p1": 10, "p2": 11}]}]),
    )
    .unwrap();
    assert_eq!(at(&s, "matriz_presiones.0.x"), &json!(10.5));
    assert_eq!(at(&s, "matriz_presiones.0.max"), &Value::Null);
    assert_eq!(s.data()["encabezado"]["temporada"], json!("25-26"));
}

#[test]
fn test_reg_027_has_header_only() {
    let mut s = start("REG.CKU.027");
    assert_eq!(
        s.data(),
        &json!({"planta": "Teno", "encabezado": {"temporada": "25-26"}, "tipo_fruta": "MANZANA"})
    );
    let report = s.set_field("observaciones", json!("sin novedad")).unwrap();
    assert_eq!(report.writes, 0);
}

#[test]
fn test_unregistered_template_runs_no_rules() {
    let mut s = start("REG.CKU.999");
    assert_eq!(s.data(), &json!({"planta": "Teno", "temporada": "25-26"}));
    s.set_field("x", json!(1)).unwrap();
    assert_eq!(s.data()["x"], json!(1));
}
