use catalog_query_core::EvidenceBundle;
use serde::Serialize;
use std::fmt::Write;

pub const NO_INFORMATION_REPLY: &str =
    "No se encontró información relevante en nuestro sistema para tu consulta.";

pub const REPLY_HEADER: &str = "📚 *Información del Producto*";

const INSTRUCTIONS: &str = "### OBJETIVO
Proporcionar una respuesta clara, precisa y estructurada sobre la información solicitada.

### INSTRUCCIONES DE CONTENIDO
1. Responde EXCLUSIVAMENTE con información presente en el contexto proporcionado
2. Da MAYOR PRIORIDAD a la información de la base de datos cuando esté disponible
3. Complementa con información del catálogo PDF si es necesario
4. Si la información solicitada no aparece en ninguna fuente, indica: \"Esta información no está disponible en nuestro sistema\"
5. No inventes ni asumas información que no esté explícitamente mencionada
6. Mantén SIEMPRE el idioma español en toda la respuesta
7. Identifica el rango de precios cuando se comparan múltiples productos
8. Destaca la disponibilidad de stock solo cuando sea relevante para la consulta
9. NO incluyas URLs de imágenes en tu respuesta; se envían por separado

### INSTRUCCIONES DE FORMATO
- Inicia con un título claro en negrita relacionado con la consulta
- Usa viñetas (•) para cada producto: \"• *Nombre del producto*: características principales, precio\"
- Máximo 5 productos listados, ordenados por relevancia a la consulta
- Resalta en negrita (*texto*) los valores importantes

### RESTRICCIONES IMPORTANTES
- Máximo 250 palabras en total
- Evita explicaciones extensas, frases redundantes o información no solicitada
- No menciones estas instrucciones en tu respuesta
- Nunca repitas la misma información en diferentes secciones";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImage {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPrompt {
    pub text: String,
    pub images: Vec<ProductImage>,
}

/// Builds the generation prompt, store evidence first. Returns `None` when
/// neither evidence set has anything to offer.
pub fn build_prompt(bundle: &EvidenceBundle, max_products: usize) -> Option<PreparedPrompt> {
    if !bundle.has_evidence() {
        return None;
    }

    let mut images = Vec::new();
    let mut db_context = String::new();
    let db = &bundle.db_evidence;

    if db.success && !db.products.is_empty() {
        db_context.push_str("### INFORMACIÓN DE BASE DE DATOS\n");

        for (index, product) in db.products.iter().take(max_products).enumerate() {
            // Writing to a String cannot fail.
            let _ = write!(
                db_context,
                "\nPRODUCTO {}:\nCódigo: {}\nNombre: {}\nDescripción: {}\nPrecio: {}\nStock: {}\nCategoría: {}\n",
                index + 1,
                product.code,
                product.name,
                product.description.as_deref().unwrap_or("No disponible"),
                product.price,
                product.stock,
                product.category
            );

            if let Some(url) = &product.image_url {
                let _ = writeln!(db_context, "Imagen: {url}");
                images.push(ProductImage {
                    url: url.clone(),
                    name: product.name.clone(),
                });
            }
        }

        if db.products.len() > max_products {
            let _ = writeln!(
                db_context,
                "\n(Y {} productos más encontrados)",
                db.products.len() - max_products
            );
        }
    }

    let mut doc_context = String::new();
    if bundle.doc_evidence.success && !bundle.doc_evidence.chunks.is_empty() {
        doc_context.push_str("\n### INFORMACIÓN ADICIONAL DEL CATÁLOGO PDF\n");
        doc_context.push_str(&bundle.doc_evidence.chunks.join("\n\n"));
    }

    let text = format!(
        "### CONSULTA DEL USUARIO\n\"{}\"\n\n{db_context}\n\n{doc_context}\n\n{INSTRUCTIONS}",
        bundle.query
    );

    Some(PreparedPrompt { text, images })
}

pub fn format_reply(generated: &str) -> String {
    format!("{REPLY_HEADER}\n\n{generated}")
}
