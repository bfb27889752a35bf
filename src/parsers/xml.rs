//! Regulator XML parser (§4.B.3, §6). Routes by filename numeric prefix;
//! walks `LISTA_DADOS_BASICOS -> DADOS_BASICOS[]` for production shapes and
//! a flat event list for the alarm shape.

use super::{
    parse_numeric, AlarmEventRecord, AuditEventRecord, FlowComputerRecord, InstrumentRecord,
    ParseOutcome, ParserRecord, ProductionRecord, ReportTypeHint,
};
use crate::domain::{Phase, PhaseBank, ReportShape};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

static FILENAME_CONVENTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{3})_(\d{8})_(\d{14})_(.+)\.xml$").unwrap());

/// `DD/MM/YYYY [HH:MM:SS]` per §6.
fn parse_regulator_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in ["%d/%m/%Y %H:%M:%S", "%d/%m/%Y"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
        if fmt == "%d/%m/%Y" {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, fmt) {
                return Some(date.and_hms_opt(0, 0, 0).unwrap());
            }
        }
    }
    None
}

struct FlatElement {
    name: String,
    text: String,
}

/// Flattens `DADOS_BASICOS` children into `(tag, text)` pairs in document
/// order. Regulator XML bodies are shallow enough that a flat walk (rather
/// than a typed `serde` struct per shape) keeps one parser covering all
/// three production sub-shapes.
fn flatten_elements(xml: &str) -> Result<Vec<FlatElement>, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut elements = Vec::new();
    let mut current_name: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_name = Some(String::from_utf8_lossy(e.name().as_ref()).to_string());
            }
            Ok(Event::Text(t)) => {
                if let Some(name) = &current_name {
                    let text = t.unescape().map_err(|e| e.to_string())?.to_string();
                    if !text.trim().is_empty() {
                        elements.push(FlatElement {
                            name: name.clone(),
                            text,
                        });
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(elements)
}

fn field(elements: &[FlatElement], name: &str) -> Option<String> {
    elements
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
        .map(|e| e.text.clone())
}

fn production_metric(elements: &[FlatElement], name: &str) -> Option<(f64, &'static str)> {
    field(elements, name)
        .and_then(|v| parse_numeric(&v))
        .map(|v| (v, "sm3"))
}

/// The primary element carries exactly 12 indexed meter-factor/pulse-count
/// pairs (§4.B.3), tagged `FATOR_MEDICAO_{i}`/`PULSOS_{i}` for i in 1..=12.
const METER_FACTOR_PAIRS: usize = 12;

fn meter_factor_pulses(elements: &[FlatElement]) -> Vec<(f64, f64)> {
    (1..=METER_FACTOR_PAIRS)
        .filter_map(|i| {
            let factor = field(elements, &format!("FATOR_MEDICAO_{i}")).and_then(|v| parse_numeric(&v));
            let pulses = field(elements, &format!("PULSOS_{i}")).and_then(|v| parse_numeric(&v));
            factor.zip(pulses)
        })
        .collect()
}

/// Pressure and temperature instrument inventories share the same indexed
/// tag convention: `{prefix}_{i}_{field}` for i in 1..=MAX_INSTRUMENTS,
/// skipped once an index carries no identifying field (§4.B.3).
const MAX_INSTRUMENTS: usize = 4;

fn instrument_inventory(elements: &[FlatElement], prefix: &str) -> Vec<InstrumentRecord> {
    (1..=MAX_INSTRUMENTS)
        .filter_map(|i| {
            let instrument = InstrumentRecord {
                serial: field(elements, &format!("{prefix}_{i}_NUM_SERIE")),
                kind: field(elements, &format!("{prefix}_{i}_TIPO")),
                manufacturer: field(elements, &format!("{prefix}_{i}_FABRICANTE")),
                model: field(elements, &format!("{prefix}_{i}_MODELO")),
                range: field(elements, &format!("{prefix}_{i}_FAIXA")),
                last_calibration: field(elements, &format!("{prefix}_{i}_ULTIMA_CALIBRACAO"))
                    .and_then(|v| parse_regulator_timestamp(&v)),
                standard_uncertainty: field(elements, &format!("{prefix}_{i}_INCERTEZA"))
                    .and_then(|v| parse_numeric(&v)),
            };
            if instrument.is_empty() {
                None
            } else {
                Some(instrument)
            }
        })
        .collect()
}

/// Reads the flow-computer configuration snapshot and its instrument
/// inventories off a production shape's elements (§4.B.3). Returns `None`
/// when none of the configuration fields are present, so callers don't
/// emit an empty [`FlowComputerRecord`].
fn parse_flow_computer(elements: &[FlatElement], asset_tag: &str) -> Option<FlowComputerRecord> {
    let record = FlowComputerRecord {
        asset_tag: asset_tag.to_string(),
        serial: field(elements, "NUM_SERIE"),
        collected_at: field(elements, "DATA_COLETA").and_then(|v| parse_regulator_timestamp(&v)),
        ambient_temperature_c: field(elements, "TEMP_AMBIENTE").and_then(|v| parse_numeric(&v)),
        ambient_pressure_kpa: field(elements, "PRESSAO_AMBIENTE").and_then(|v| parse_numeric(&v)),
        reference_temperature_c: field(elements, "TEMP_REFERENCIA").and_then(|v| parse_numeric(&v)),
        reference_pressure_kpa: field(elements, "PRESSAO_REFERENCIA").and_then(|v| parse_numeric(&v)),
        software_version: field(elements, "VERSAO_SOFTWARE"),
        meter_factors: meter_factor_pulses(elements),
        pressure_instruments: instrument_inventory(elements, "INSTRUMENTO_PRESSAO"),
        temperature_instruments: instrument_inventory(elements, "INSTRUMENTO_TEMPERATURA"),
    };
    if record.is_empty() {
        None
    } else {
        Some(record)
    }
}

/// Per-period auxiliary fields outside the 30-metric grain (§4.B.3):
/// totalizer start/end, CTL/CPL/CTPL, and the period's meter factor.
fn parse_period_detail(elements: &[FlatElement]) -> BTreeMap<String, f64> {
    let mut detail = BTreeMap::new();
    for (key, tag) in [
        ("ctl", "CTL"),
        ("cpl", "CPL"),
        ("ctpl", "CTPL"),
        ("meter_factor", "FATOR_MEDIDOR"),
        ("totalizer_start", "TOTALIZADOR_INICIO"),
        ("totalizer_end", "TOTALIZADOR_FIM"),
    ] {
        if let Some(value) = field(elements, tag).and_then(|v| parse_numeric(&v)) {
            detail.insert(key.to_string(), value);
        }
    }
    detail
}

fn parse_production_shape(
    xml: &str,
    shape: ReportShape,
    asset_tag: &str,
) -> ParseOutcome {
    let elements = match flatten_elements(xml) {
        Ok(e) => e,
        Err(e) => return ParseOutcome::failed(format!("xml parse error: {e}")),
    };

    let mut warnings = Vec::new();
    let period_end = field(&elements, "DATA_COLETA")
        .or_else(|| field(&elements, "HORA_MEDICAO"))
        .and_then(|v| parse_regulator_timestamp(&v));
    let Some(period_end) = period_end else {
        return ParseOutcome::failed("no parseable collection timestamp".to_string());
    };

    let mut metrics: BTreeMap<(PhaseBank, Phase), (f64, &'static str)> = BTreeMap::new();
    if let Some(gross) = production_metric(&elements, "VOLUME_BRUTO") {
        metrics.insert((PhaseBank::UncorrectedMass, Phase::Total), gross);
    }
    if let Some(net) = production_metric(&elements, "VOLUME_LIQUIDO") {
        metrics.insert((PhaseBank::CorrectedMass, Phase::Total), net);
    }
    if let Some(corrected) = production_metric(&elements, "VOLUME_CORRIGIDO") {
        metrics.insert((PhaseBank::PvtRefVolSc, Phase::Total), corrected);
    }

    let bsw_pct = field(&elements, "BSW").and_then(|v| parse_numeric(&v));

    if metrics.is_empty() {
        warnings.push("no recognized production fields present".to_string());
    }

    let mut densities = BTreeMap::new();
    for (phase, tag) in [
        (Phase::Oil, "DENSIDADE_OLEO"),
        (Phase::Gas, "DENSIDADE_GAS"),
        (Phase::Water, "DENSIDADE_AGUA"),
        (Phase::Hc, "DENSIDADE_HC"),
    ] {
        if let Some(value) = field(&elements, tag).and_then(|v| parse_numeric(&v)) {
            densities.insert(phase, (value, "kg_m3"));
        }
    }

    let record = ProductionRecord {
        asset_tag: asset_tag.to_string(),
        bank: None,
        stream: None,
        riser: None,
        report_type_hint: ReportTypeHint::Daily,
        period_start: None,
        period_end,
        metrics,
        average_pressure: production_metric(&elements, "PRESSAO_MEDIA").map(|(v, _)| (v, "kpa")),
        average_temperature: production_metric(&elements, "TEMPERATURA_MEDIA")
            .map(|(v, _)| (v, "c")),
        densities,
        bsw_pct,
        source_shape: shape,
        period_detail: parse_period_detail(&elements),
    };

    let mut records = vec![ParserRecord::Production(record)];
    if let Some(flow_computer) = parse_flow_computer(&elements, asset_tag) {
        records.push(ParserRecord::FlowComputer(flow_computer));
    }

    ParseOutcome::ok(records, warnings)
}

/// Alarm shape (004): per-asset alarm events and audit (old/new value)
/// events (§4.B.3).
fn parse_alarm_shape(xml: &str, asset_tag: &str) -> ParseOutcome {
    let elements = match flatten_elements(xml) {
        Ok(e) => e,
        Err(e) => return ParseOutcome::failed(format!("xml parse error: {e}")),
    };

    const EVENT_WINDOW: usize = 6;
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut i = 0;
    while i < elements.len() {
        let window_end = (i + EVENT_WINDOW).min(elements.len());
        let window = &elements[i..window_end];
        if elements[i].name.eq_ignore_ascii_case("EVENTO_ALARME") {
            let timestamp = field(window, "DATA_HORA").and_then(|v| parse_regulator_timestamp(&v));
            let parameter = field(window, "PARAMETRO");
            let value = field(window, "VALOR");
            match (timestamp, parameter, value) {
                (Some(ts), Some(param), Some(val)) => {
                    records.push(ParserRecord::AlarmEvent(AlarmEventRecord {
                        asset_tag: asset_tag.to_string(),
                        timestamp: ts,
                        parameter: param,
                        value: val,
                    }));
                }
                _ => warnings.push("incomplete alarm event, skipped".to_string()),
            }
        } else if elements[i].name.eq_ignore_ascii_case("EVENTO_AUDITORIA") {
            let timestamp = field(window, "DATA_HORA").and_then(|v| parse_regulator_timestamp(&v));
            let parameter = field(window, "PARAMETRO");
            let old_value = field(window, "VALOR_ANTIGO");
            let new_value = field(window, "VALOR_NOVO");
            match (timestamp, parameter, old_value, new_value) {
                (Some(ts), Some(param), Some(old), Some(new)) => {
                    records.push(ParserRecord::AuditEvent(AuditEventRecord {
                        asset_tag: asset_tag.to_string(),
                        timestamp: ts,
                        parameter: param,
                        old_value: old,
                        new_value: new,
                    }));
                }
                _ => warnings.push("incomplete audit event, skipped".to_string()),
            }
        }
        i += 1;
    }

    if records.is_empty() {
        return ParseOutcome::failed("no alarm or audit events found".to_string());
    }
    ParseOutcome::ok(records, warnings)
}

/// Parses the filename convention `NNN_<CNPJ8>_<YYYYMMDDHHMMSS>_<INSTALLATION>.xml`
/// (§4.B.3) for header metadata, returning `(prefix, cnpj8, generated_at, installation)`.
pub fn parse_filename_convention(filename: &str) -> Option<(String, String, String, String)> {
    let caps = FILENAME_CONVENTION.captures(filename)?;
    Some((
        caps[1].to_string(),
        caps[2].to_string(),
        caps[3].to_string(),
        caps[4].to_string(),
    ))
}

pub fn parse_xml(path: &Path, shape: ReportShape, asset_tag: &str) -> ParseOutcome {
    let xml = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => return ParseOutcome::failed(format!("io error: {e}")),
    };
    match shape {
        ReportShape::Xml001 | ReportShape::Xml002 | ReportShape::Xml003 => {
            parse_production_shape(&xml, shape, asset_tag)
        }
        ReportShape::Xml004 => parse_alarm_shape(&xml, asset_tag),
        _ => ParseOutcome::failed(format!("{shape} is not an XML shape")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_convention_parses_header_metadata() {
        let parsed = parse_filename_convention("001_12345678_20260101120000_STATION01.xml");
        assert_eq!(
            parsed,
            Some((
                "001".to_string(),
                "12345678".to_string(),
                "20260101120000".to_string(),
                "STATION01".to_string()
            ))
        );
    }

    #[test]
    fn comma_decimal_and_regulator_date_parse() {
        let xml = r#"<LISTA_DADOS_BASICOS><DADOS_BASICOS>
            <DATA_COLETA>15/03/2026 08:00:00</DATA_COLETA>
            <VOLUME_BRUTO>1234,56</VOLUME_BRUTO>
        </DADOS_BASICOS></LISTA_DADOS_BASICOS>"#;
        let outcome = parse_production_shape(xml, ReportShape::Xml001, "13FT0367");
        assert!(outcome.success);
        match &outcome.records[0] {
            ParserRecord::Production(p) => {
                assert_eq!(
                    p.metrics.get(&(PhaseBank::UncorrectedMass, Phase::Total)),
                    Some(&(1234.56, "sm3"))
                );
            }
            _ => panic!("expected production record"),
        }
    }

    #[test]
    fn period_detail_and_flow_computer_fields_extracted() {
        let xml = r#"<LISTA_DADOS_BASICOS><DADOS_BASICOS>
            <DATA_COLETA>15/03/2026 08:00:00</DATA_COLETA>
            <VOLUME_BRUTO>1234,56</VOLUME_BRUTO>
            <CTL>0,9987</CTL>
            <CPL>1,0002</CPL>
            <CTPL>0,9989</CTPL>
            <FATOR_MEDIDOR>1,0021</FATOR_MEDIDOR>
            <TOTALIZADOR_INICIO>1000,0</TOTALIZADOR_INICIO>
            <TOTALIZADOR_FIM>2234,56</TOTALIZADOR_FIM>
            <NUM_SERIE>FC-9911</NUM_SERIE>
            <VERSAO_SOFTWARE>3.2.1</VERSAO_SOFTWARE>
            <TEMP_AMBIENTE>28,4</TEMP_AMBIENTE>
            <PRESSAO_AMBIENTE>101,3</PRESSAO_AMBIENTE>
            <FATOR_MEDICAO_1>1,0005</FATOR_MEDICAO_1>
            <PULSOS_1>10234</PULSOS_1>
            <FATOR_MEDICAO_2>0,9998</FATOR_MEDICAO_2>
            <PULSOS_2>10987</PULSOS_2>
            <INSTRUMENTO_PRESSAO_1_NUM_SERIE>PT-001</INSTRUMENTO_PRESSAO_1_NUM_SERIE>
            <INSTRUMENTO_PRESSAO_1_TIPO>transmitter</INSTRUMENTO_PRESSAO_1_TIPO>
            <INSTRUMENTO_PRESSAO_1_FABRICANTE>Rosemount</INSTRUMENTO_PRESSAO_1_FABRICANTE>
            <INSTRUMENTO_PRESSAO_1_MODELO>3051S</INSTRUMENTO_PRESSAO_1_MODELO>
            <INSTRUMENTO_PRESSAO_1_ULTIMA_CALIBRACAO>01/01/2026</INSTRUMENTO_PRESSAO_1_ULTIMA_CALIBRACAO>
            <INSTRUMENTO_PRESSAO_1_INCERTEZA>0,05</INSTRUMENTO_PRESSAO_1_INCERTEZA>
        </DADOS_BASICOS></LISTA_DADOS_BASICOS>"#;
        let outcome = parse_production_shape(xml, ReportShape::Xml001, "13FT0367");
        assert!(outcome.success);
        assert_eq!(outcome.records.len(), 2);

        let production = outcome
            .records
            .iter()
            .find_map(|r| match r {
                ParserRecord::Production(p) => Some(p),
                _ => None,
            })
            .expect("expected a production record");
        assert_eq!(production.period_detail.get("ctl"), Some(&0.9987));
        assert_eq!(production.period_detail.get("totalizer_end"), Some(&2234.56));

        let flow_computer = outcome
            .records
            .iter()
            .find_map(|r| match r {
                ParserRecord::FlowComputer(f) => Some(f),
                _ => None,
            })
            .expect("expected a flow-computer record");
        assert_eq!(flow_computer.serial.as_deref(), Some("FC-9911"));
        assert_eq!(flow_computer.software_version.as_deref(), Some("3.2.1"));
        assert_eq!(flow_computer.meter_factors, vec![(1.0005, 10234.0), (0.9998, 10987.0)]);
        assert_eq!(flow_computer.pressure_instruments.len(), 1);
        let instrument = &flow_computer.pressure_instruments[0];
        assert_eq!(instrument.serial.as_deref(), Some("PT-001"));
        assert_eq!(instrument.manufacturer.as_deref(), Some("Rosemount"));
        assert!(instrument.last_calibration.is_some());
        assert_eq!(flow_computer.temperature_instruments.len(), 0);
    }
}
