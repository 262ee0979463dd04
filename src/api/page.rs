//! Server-rendered HTML for the search form and the report view.

use pulldown_cmark::{html, Event, Options, Parser};

use crate::filters::{
    FilterInput, FilterSummary, PROPERTY_TYPE_CATALOG, SECTOR_CATALOG, STRATA_CATALOG,
};

use super::routes::AnalysisOutcome;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; color: #222; }
header { background: #0068C9; color: white; padding: 1.5rem 2rem; }
header h1 { margin: 0 0 .3rem 0; }
main { display: flex; gap: 2rem; padding: 2rem; }
form { min-width: 320px; }
fieldset { border: 1px solid #dee2e6; border-radius: 8px; margin-bottom: 1rem; }
label { display: block; margin: .4rem 0 .1rem 0; font-weight: 600; }
input[type=number], select { width: 100%; padding: .3rem; }
button, .download { background: #0068C9; color: white; border: none; border-radius: 20px;
  padding: .5rem 2rem; font-weight: bold; cursor: pointer; text-decoration: none; display: inline-block; }
button:disabled { background: #8aa9c9; cursor: wait; }
.errors { background: #fdecea; border: 1px solid #f5c2c0; border-radius: 8px; padding: .5rem 1.5rem; }
.warnings { background: #fff8e1; border: 1px solid #ffe08a; border-radius: 8px; padding: .5rem 1.5rem; }
.metrics { display: flex; gap: 1rem; flex-wrap: wrap; }
.metric { border: 1px solid #dee2e6; border-radius: 8px; padding: .5rem 1rem; }
.analysis-output { background: #f8f9fa; border: 1px solid #dee2e6; border-radius: 8px;
  padding: 1.5rem; margin: 1rem 0; }
.analysis-output table { border-collapse: collapse; }
.analysis-output th, .analysis-output td { border: 1px solid #dee2e6; padding: .3rem .6rem; }
#busy { display: none; font-style: italic; margin-top: 1rem; }
footer { text-align: center; color: #666; padding: 1rem; }
"#;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the report Markdown to HTML.
///
/// The report is model output, so raw HTML in it is shown as text.
pub fn render_markdown(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<header>
<h1>🤖 Análisis Inmobiliario con Agentes de IA</h1>
<div>📍 Pereira, Risaralda - Colombia</div>
</header>
{body}
<footer>Las API Keys se cargan desde el archivo <code>.env</code> en la raíz del proyecto.</footer>
</body>
</html>"#,
        title = escape_html(title),
        STYLE = STYLE,
        body = body,
    )
}

fn multi_select<T: ToString>(name: &str, label: &str, options: &[T], selected: &[String]) -> String {
    let options = options
        .iter()
        .map(|o| {
            let value = o.to_string();
            let mark = if selected.contains(&value) { " selected" } else { "" };
            format!(
                r#"<option value="{v}"{mark}>{v}</option>"#,
                v = escape_html(&value),
                mark = mark
            )
        })
        .collect::<String>();

    format!(
        r#"<label for="{name}">{label}</label>
<select id="{name}" name="{name}" multiple size="{size}">{options}</select>"#,
        name = name,
        label = label,
        size = options_len(&options),
        options = options,
    )
}

fn options_len(rendered: &str) -> usize {
    rendered.matches("<option").count().clamp(2, 8)
}

fn message_list(class: &str, messages: &[String]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let items = messages
        .iter()
        .map(|m| format!("<li>{}</li>", escape_html(m)))
        .collect::<String>();
    format!(r#"<div class="{class}"><ul>{items}</ul></div>"#)
}

fn metrics(summary: &FilterSummary) -> String {
    format!(
        r#"<div class="metrics">
<div class="metric">💰 Rango de Inversión<br><b>{investment}</b></div>
<div class="metric">📐 Área Objetivo<br><b>{area}</b></div>
<div class="metric">🏘️ Sectores<br><b>{sectors}</b></div>
<div class="metric">🏛️ Estratos<br><b>{strata}</b></div>
</div>"#,
        investment = escape_html(&summary.investment_range),
        area = escape_html(&summary.area_range),
        sectors = escape_html(&summary.sectors),
        strata = escape_html(&summary.strata),
    )
}

/// The search form, pre-filled with `input`, with optional error messages.
///
/// Metrics for the current filters are shown when they validate.
pub fn form_page(input: &FilterInput, errors: &[String]) -> String {
    let strata: Vec<String> = input.strata.iter().map(|s| s.to_string()).collect();

    let body = format!(
        r#"<main>
<form method="post" action="/analyze" onsubmit="document.getElementById('run').disabled = true; document.getElementById('busy').style.display = 'block';">
<h2>⚙️ Configuración de Búsqueda</h2>
{errors}
<fieldset>
<legend>💰 Precio (COP)</legend>
<label for="price_min">Mínimo</label>
<input id="price_min" name="price_min" type="number" step="10000000" value="{price_min}">
<label for="price_max">Máximo</label>
<input id="price_max" name="price_max" type="number" step="10000000" value="{price_max}">
</fieldset>
<fieldset>
<legend>📐 Área (m²)</legend>
<label for="area_min">Mínima</label>
<input id="area_min" name="area_min" type="number" step="10" value="{area_min}">
<label for="area_max">Máxima</label>
<input id="area_max" name="area_max" type="number" step="10" value="{area_max}">
</fieldset>
<fieldset>
{sectors}
{strata}
{types}
</fieldset>
<button id="run" type="submit">🚀 INICIAR ANÁLISIS</button>
<div id="busy">🤖 El equipo de agentes de IA ha comenzado a trabajar... Esto puede tardar varios minutos...</div>
</form>
<section>
{metrics}
<h2>Encuentra las mejores oportunidades de inversión inmobiliaria</h2>
<p>Un equipo de cuatro agentes busca propiedades, investiga el mercado, hace el análisis financiero y redacta un reporte de inversión descargable.</p>
</section>
</main>"#,
        errors = message_list("errors", errors),
        metrics = input
            .validate()
            .map(|set| metrics(&set.summary()))
            .unwrap_or_default(),
        price_min = input.price_min,
        price_max = input.price_max,
        area_min = input.area_min,
        area_max = input.area_max,
        sectors = multi_select("sectors", "🏘️ Sectores de Interés", SECTOR_CATALOG, &input.sectors),
        strata = multi_select("strata", "🏛️ Estratos", STRATA_CATALOG, &strata),
        types = multi_select(
            "property_types",
            "🏡 Tipo de Propiedad",
            PROPERTY_TYPE_CATALOG,
            &input.property_types
        ),
    );

    layout("Análisis Inmobiliario", &body)
}

/// The finished report with metrics, warnings and the download link.
pub fn report_page(outcome: &AnalysisOutcome) -> String {
    let download = if outcome.report_available {
        r#"<h3>📁 Descargar Reporte Completo</h3>
<a class="download" href="/api/report">⬇️ Descargar Reporte Final</a>"#
    } else {
        ""
    };

    let body = format!(
        r#"<main><section style="flex: 1">
{metrics}
<p>✅ ¡Análisis completado exitosamente!</p>
{warnings}
<h3>🎯 Reporte Final del Equipo de Agentes</h3>
<div class="analysis-output">{report}</div>
{download}
<p><a href="/">← Nueva búsqueda</a></p>
</section></main>"#,
        metrics = metrics(&outcome.summary),
        warnings = message_list("warnings", &outcome.warnings),
        report = render_markdown(&outcome.result.report),
        download = download,
    );

    layout("Reporte de Inversión", &body)
}

/// A failed run: message plus the full error chain.
pub fn error_page(message: &str, detail: &str) -> String {
    let body = format!(
        r#"<main><section>
<div class="errors"><p>❌ {message}</p></div>
<pre>{detail}</pre>
<p><a href="/">← Volver</a></p>
</section></main>"#,
        message = escape_html(message),
        detail = escape_html(detail),
    );
    layout("Error", &body)
}
