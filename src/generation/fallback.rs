//! Local quiz synthesis used when the primary path fails.

use super::render::render_quiz;
use super::{FallbackBuilder, GeneratedQuiz, QuizQuestion};
use crate::context::DerivedContext;
use crate::types::{GenerationRequest, GenerationResult};

const SPANISH: &[(&str, &str)] = &[
    ("¿Qué es {t} y por qué es importante estudiarlo?", "{T} es un tema fundamental que ayuda a comprender conceptos esenciales. Estudiarlo desarrolla habilidades de análisis y comprensión del mundo que nos rodea."),
    ("¿Cuáles son los conceptos principales de {t}?", "Los conceptos principales incluyen las definiciones básicas, las características distintivas, ejemplos representativos y aplicaciones prácticas en situaciones reales."),
    ("¿Cómo se relaciona {t} con la vida cotidiana?", "{T} tiene aplicaciones directas en la vida diaria. Comprenderlo nos ayuda a tomar mejores decisiones y a entender fenómenos que observamos con frecuencia."),
    ("Describe las características más importantes de {t}.", "Las características más importantes incluyen sus propiedades fundamentales, cómo se identifica, sus componentes principales y qué lo diferencia de conceptos similares."),
    ("Menciona y explica tres ejemplos relacionados con {t}.", "Los ejemplos pueden incluir casos del colegio, situaciones familiares y fenómenos naturales observables, cada uno mostrando un aspecto distinto del tema."),
    ("¿Por qué es importante conocer sobre {t}?", "Conocer sobre {t} desarrolla el pensamiento crítico, permite resolver problemas reales y facilita la comprensión de temas avanzados relacionados."),
    ("¿Cómo le explicarías {t} a alguien que no lo conoce?", "Para explicarlo con claridad conviene partir de ideas simples, usar ejemplos cotidianos concretos y relacionarlo con experiencias que la persona ya conoce."),
    ("¿Qué preguntas surgen al estudiar {t}?", "Pueden surgir preguntas sobre su origen, cómo funciona, para qué sirve, cómo se aplica y cómo se relaciona con los conocimientos previos."),
    ("Compara {t} con otro tema que hayas estudiado.", "Al comparar temas se identifican similitudes en los principios básicos, diferencias en sus aplicaciones y conexiones que enriquecen la comprensión de ambos."),
    ("¿Cuál es la idea más importante que aprendiste sobre {t}?", "La idea más importante es comprender sus fundamentos, reconocer su utilidad práctica y poder aplicar este conocimiento en situaciones nuevas."),
    ("¿Cómo puedes aplicar lo aprendido sobre {t}?", "Este conocimiento se puede aplicar en actividades escolares, proyectos personales, la resolución de problemas cotidianos y la comprensión de noticias relacionadas."),
    ("Resume con tus propias palabras qué es {t}.", "Un buen resumen incluye una definición clara, las características principales, por qué es importante y uno o dos ejemplos que ilustren el concepto."),
    ("¿Qué dificultades encontraste al estudiar {t}?", "Las dificultades comunes incluyen entender la terminología nueva, conectar conceptos entre sí y visualizar cómo se aplica el conocimiento en la práctica."),
    ("¿Qué más te gustaría aprender sobre {t}?", "Se puede profundizar estudiando casos especiales, investigando la historia del tema, explorando aplicaciones avanzadas y descubriendo temas relacionados."),
    ("Crea un ejemplo original relacionado con {t}.", "Un buen ejemplo original demuestra comprensión del tema, es relevante y aplicable, y muestra correctamente los conceptos aprendidos en una situación nueva."),
];

const ENGLISH: &[(&str, &str)] = &[
    ("What is {t} and why is it important to study?", "{T} is a fundamental topic that helps understand essential concepts. Studying it develops analysis skills and understanding of the world around us."),
    ("What are the main concepts of {t}?", "The main concepts include basic definitions, distinctive characteristics, representative examples, and practical applications in real situations."),
    ("How does {t} relate to everyday life?", "{T} has direct applications in daily life. Understanding it helps us make better decisions and comprehend phenomena we observe regularly."),
    ("Describe the most important characteristics of {t}.", "The most important characteristics include its fundamental properties, how it is identified, its main components, and what differentiates it from similar concepts."),
    ("Mention and explain three examples related to {t}.", "Relevant examples can include cases from school, family situations, and observable natural phenomena, each showing a different aspect of the topic."),
    ("Why is it important to know about {t}?", "Knowing about {t} develops critical thinking, allows solving real problems, and makes related advanced topics easier to understand."),
    ("How would you explain {t} to someone unfamiliar with it?", "Start with simple ideas, use concrete everyday examples, and relate it to experiences the person already knows."),
    ("What questions arise when studying {t}?", "Questions may arise about its origin, how it works, what it is used for, how it is applied, and how it relates to prior knowledge."),
    ("Compare {t} with another topic you have studied.", "Comparing topics reveals similarities in basic principles, differences in applications, and connections that enrich understanding of both."),
    ("What is the most important idea you learned about {t}?", "The most important idea is understanding the fundamentals, recognizing practical utility, and being able to apply the knowledge in new situations."),
    ("How can you apply what you learned about {t}?", "This knowledge can be applied in school activities, personal projects, everyday problem solving, and understanding related news."),
    ("Summarize in your own words what {t} is.", "A good summary includes a clear definition, the main characteristics, why it matters, and one or two examples that illustrate the concept."),
    ("What difficulties did you encounter when studying {t}?", "Common difficulties include new terminology, connecting different concepts, and seeing how the knowledge applies in practice."),
    ("What else would you like to learn about {t}?", "You can go deeper by studying special cases, researching the topic's history, exploring advanced applications, and discovering related topics."),
    ("Create an original example related to {t}.", "A good original example demonstrates understanding of the topic, is relevant, and correctly shows the learned concepts in a new situation."),
];

/// Deterministic quiz built from topic-parameterised templates.
///
/// Output depends only on the request, so two fallbacks for the same request
/// are byte-identical.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateFallback;

impl TemplateFallback {
    pub fn quiz(request: &GenerationRequest) -> GeneratedQuiz {
        let spanish = request.is_spanish();
        let trimmed = request.topic.trim();
        let topic = if trimmed.is_empty() {
            if spanish { "el tema" } else { "the topic" }
        } else {
            trimmed
        };
        let topic_cap = {
            let mut chars = topic.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        };
        let prefix = if spanish { "CUESTIONARIO" } else { "QUIZ" };
        let templates = if spanish { SPANISH } else { ENGLISH };
        let fill = |s: &str| s.replace("{T}", &topic_cap).replace("{t}", topic);

        GeneratedQuiz {
            title: format!("{} - {}", prefix, topic.to_uppercase()),
            questions: templates
                .iter()
                .map(|(q, a)| QuizQuestion::new(fill(q), fill(a)))
                .collect(),
        }
    }
}

impl FallbackBuilder for TemplateFallback {
    fn build(&self, request: &GenerationRequest, _context: &DerivedContext) -> GenerationResult {
        render_quiz(request, &Self::quiz(request), &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_complete_and_valid() {
        let req = GenerationRequest::new("es", "5A", "Ciencias", "Fotosíntesis");
        let quiz = TemplateFallback::quiz(&req);
        assert_eq!(quiz.title, "CUESTIONARIO - FOTOSÍNTESIS");
        assert_eq!(quiz.questions.len(), 15);
        assert!(quiz.validate().is_ok());
        assert!(quiz.questions[0].question.contains("Fotosíntesis"));
        assert!(quiz.questions[0].expected_answer.starts_with("Fotosíntesis es"));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let req = GenerationRequest::new("en", "5A", "Science", "water cycle");
        let ctx = DerivedContext::empty();
        assert_eq!(TemplateFallback.build(&req, &ctx), TemplateFallback.build(&req, &ctx));
    }

    #[test]
    fn test_blank_topic_gets_placeholder() {
        let req = GenerationRequest::new("en", "5A", "Science", "   ");
        let quiz = TemplateFallback::quiz(&req);
        assert_eq!(quiz.title, "QUIZ - THE TOPIC");
        assert!(quiz.questions[1].question.contains("the topic"));
    }

    #[test]
    fn test_english_document_shape() {
        let req = GenerationRequest::new("en", "5A", "Science", "water");
        let out = TemplateFallback.build(&req, &DerivedContext::empty());
        assert!(out.document.starts_with("<h2>QUIZ - WATER</h2>"));
        assert!(out.document.contains("<strong>15. "));
        assert!(out.references.is_empty());
    }
}
