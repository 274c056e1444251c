//! Plain-text summary of a recipe run

use minijinja::{context, Environment};

use crate::error::Result;
use crate::recipe::{TaperDesign, TaperDesignRecipe};
use crate::select::SelectionReason;

const REPORT_TEMPLATE: &str = r##"Routing taper design recipe
Generated: {{ timestamp }}
Fingerprint: {{ fingerprint }}

Design intent
  routing loss      {{ routing_loss }} dB/cm
  max reflection    {{ max_reflection }} dB
  length sweep      {{ start_length }} - {{ stop_length }} um ({{ num_pts }} points)

Candidates
{% for c in candidates %}
  {{ c.name }} ({{ c.width_type }})
    L: {{ "%.3f"|format(c.length) }} um | T: {{ "%.4f"|format(c.transmission) }} dB | R: {{ "%.2f"|format(c.reflection) }} dB{% if not c.reached %}  [routing loss not reached]{% endif %}

{% endfor %}
{% if failures|length > 0 %}
Failed candidates
{% for f in failures %}
  {{ f.name }}: {{ f.reason }}
{% endfor %}

{% endif %}
Selected: {{ selected }}
  {{ reason }}
"##;

/// Render the human readable report of `design`.
pub fn render_report(recipe: &TaperDesignRecipe, design: &TaperDesign) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("report", REPORT_TEMPLATE)?;
    let template = env.get_template("report")?;

    let candidates: Vec<_> = design
        .scores
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.candidate.name(),
                "width_type": s.candidate.width_type.as_str(),
                "length": s.point.length,
                "transmission": s.point.transmission,
                "reflection": s.point.reflection,
                "reached": s.reached_target,
            })
        })
        .collect();

    let di = &recipe.design_intent;
    let reason = match design.reason {
        SelectionReason::ShortestAndQuietest => {
            "shortest taper, also the least reflective".to_string()
        }
        SelectionReason::ShortestBelowLimit => format!(
            "shortest taper, reflecting below {} dB",
            di.max_reflection
        ),
        SelectionReason::LowestReflection => format!(
            "lowest reflection; the shortest taper exceeds {} dB",
            di.max_reflection
        ),
    };

    let output = template.render(context! {
        timestamp => chrono::Utc::now().to_rfc3339(),
        fingerprint => design.fingerprint.to_hex(),
        routing_loss => di.narrow_waveguide_routing_loss_per_cm,
        max_reflection => di.max_reflection,
        start_length => di.start_length,
        stop_length => di.stop_length,
        num_pts => di.num_pts,
        candidates => candidates,
        failures => &design.failures,
        selected => design.component.name(),
        reason => reason,
    })?;

    Ok(output)
}
