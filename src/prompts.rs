//! Default prompts. Each can be overridden under `[prompts]` in the config file.

/// Instruction sent with a reference image to the edit endpoint.
pub const EDIT_PROMPT: &str = "Recreate this exact car model accurately, front three-quarter view. \
The car must be painted in glossy black color. \
Place it in a dark gray studio with a subtle gradient background. \
Show the ENTIRE car fully visible from bumper to bumper with generous space around it, \
do NOT crop any part of the car. \
Use strong key lighting from the front-left to illuminate the bumper, grille, and side panels clearly. \
Add soft rim light highlights along the edges. \
All car details (grille, headlights, bumper, wheels, rear) must be clearly visible. \
The brand logo and badge on the grille must match the reference as closely as possible: \
copy the exact shape, proportions, and placement of the emblem from the reference image. \
Professional automotive photography, photorealistic. \
Keep the car design exactly as shown in the reference. \
IMPORTANT: The car must have NO license plates, NO number plates at all; \
the front and rear plate areas must be completely blank, smooth, body-colored. \
No text, no watermarks, no labels.";

/// Text-only fallback. Placeholders: `{year}`, `{category}`, `{item}`
/// (`{make}` and `{model}` are accepted as aliases).
pub const TEXT_PROMPT_TEMPLATE: &str = "Professional studio photograph of a {year} {category} {item} in glossy black color, \
facing left, front-left three-quarter view, \
in a dark gray studio with a subtle gradient background. \
Show the ENTIRE car fully visible from bumper to bumper with generous space around it. \
Use strong key lighting from the front-left to illuminate all details clearly. \
Add soft rim light highlights along the edges. \
Professional automotive photography, photorealistic, the actual real {category} {item} car model. \
IMPORTANT: The car must have NO license plates, NO number plates at all; \
the front and rear plate areas must be completely blank, smooth, body-colored. \
No text, no watermarks, no labels.";

/// Vision prompt for the direction classifier. `{count}` is the number of images.
pub const CLASSIFY_PROMPT: &str = "You are given {count} car photos in order. \
For each photo, decide which way the front of the car points: \"left\" or \"right\". \
Reply with only a JSON array of {count} strings, in the same order as the photos, \
for example [\"left\",\"right\"].";
