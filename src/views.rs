use std::fmt::Write;

use crate::genome::SimulationParameters;

const HTMX_SCRIPT_URL: &str = "https://unpkg.com/htmx.org@2.0.4";

struct ParameterField {
    id: &'static str,
    label: &'static str,
    min: f64,
    max: f64,
    step: f64,
    value: f64,
}

fn parameter_fields(params: &SimulationParameters) -> [ParameterField; 6] {
    [
        ParameterField {
            id: "populationSize",
            label: "Population size",
            min: 2.0,
            max: 100.0,
            step: 1.0,
            value: params.population_size as f64,
        },
        ParameterField {
            id: "mutationRate",
            label: "Mutation rate",
            min: 0.0,
            max: 1.0,
            step: 0.01,
            value: params.mutation_rate,
        },
        ParameterField {
            id: "crossoverRate",
            label: "Crossover rate",
            min: 0.0,
            max: 1.0,
            step: 0.01,
            value: params.crossover_rate,
        },
        ParameterField {
            id: "foodAvailability",
            label: "Food availability",
            min: 0.0,
            max: 1.0,
            step: 0.05,
            value: params.food_availability,
        },
        ParameterField {
            id: "predatorDensity",
            label: "Predator density",
            min: 0.0,
            max: 1.0,
            step: 0.05,
            value: params.predator_density,
        },
        ParameterField {
            id: "waterTemperature",
            label: "Water temperature (°C)",
            min: 0.0,
            max: 40.0,
            step: 1.0,
            value: params.water_temperature,
        },
    ]
}

/// Fragment swapped in by htmx. Also embedded in the full page.
pub fn simulation_content(params: &SimulationParameters) -> Result<String, std::fmt::Error> {
    let mut html = String::new();
    writeln!(html, r#"<section id="simulation-content" class="simulation">"#)?;
    writeln!(html, r#"  <form id="simulation-parameters" class="parameters">"#)?;
    for field in parameter_fields(params) {
        writeln!(
            html,
            r#"    <label for="{id}">{label} <output id="{id}-value">{value}</output></label>"#,
            id = field.id,
            label = field.label,
            value = field.value,
        )?;
        writeln!(
            html,
            r#"    <input type="range" id="{id}" name="{id}" min="{min}" max="{max}" step="{step}" value="{value}">"#,
            id = field.id,
            min = field.min,
            max = field.max,
            step = field.step,
            value = field.value,
        )?;
    }
    writeln!(html, "  </form>")?;
    writeln!(html, r#"  <div class="controls">"#)?;
    writeln!(html, r#"    <button type="button" id="breed-button">Breed</button>"#)?;
    writeln!(
        html,
        r##"    <button type="button" hx-get="/simulation" hx-target="#simulation-content" hx-swap="outerHTML">Reset</button>"##
    )?;
    writeln!(html, "  </div>")?;
    writeln!(html, r#"  <div class="tank"><canvas id="fish-tank"></canvas></div>"#)?;
    writeln!(html, r#"  <table id="breeding-results" class="results">"#)?;
    writeln!(
        html,
        "    <thead><tr><th>Gene</th><th>Fish 1</th><th>Fish 2</th><th>Offspring</th></tr></thead>"
    )?;
    writeln!(html, "    <tbody></tbody>")?;
    writeln!(html, "  </table>")?;
    writeln!(html, "</section>")?;
    Ok(html)
}

pub fn simulation_page(params: &SimulationParameters) -> Result<String, std::fmt::Error> {
    let content = simulation_content(params)?;
    let mut html = String::new();
    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, r#"<html lang="en">"#)?;
    writeln!(html, "<head>")?;
    writeln!(html, r#"  <meta charset="utf-8">"#)?;
    writeln!(
        html,
        r#"  <meta name="viewport" content="width=device-width, initial-scale=1">"#
    )?;
    writeln!(html, "  <title>Genetic Fish</title>")?;
    writeln!(html, r#"  <link rel="stylesheet" href="/static/css/simulation.css">"#)?;
    writeln!(html, r#"  <script src="{HTMX_SCRIPT_URL}"></script>"#)?;
    writeln!(html, r#"  <script src="/static/js/simulation.js" defer></script>"#)?;
    writeln!(html, "</head>")?;
    writeln!(html, "<body>")?;
    writeln!(html, "  <header><h1>Genetic Fish</h1></header>")?;
    writeln!(html, "  <main>")?;
    html.push_str(&content);
    writeln!(html, "  </main>")?;
    writeln!(html, "</body>")?;
    writeln!(html, "</html>")?;
    Ok(html)
}
