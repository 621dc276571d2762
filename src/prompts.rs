//! Prompt templates, one per feature.
//!
//! Each template spells out the exact JSON shape the matching record in
//! [`crate::ai_models`] is built from.

use serde_json::json;

use crate::metrics::PricePoint;
use crate::models::{ChatTurn, VehicleRecord};

pub fn chat_prompt(message: &str, history: &[ChatTurn]) -> String {
    let history = serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are AutoVolt's car assistant. Respond EXACTLY in this format without any additional text or markdown:
{{
  "message": "your response here",
  "preferences": {{
    "fuelType": null or string,
    "bodyType": null or string,
    "make": null or string,
    "minPrice": null or number,
    "maxPrice": null or number,
    "minYear": null or number,
    "maxYear": null or number
  }},
  "shouldAskMore": true or false
}}

Current user message: "{message}"
Previous conversation: {history}

Extract preferences from the conversation and provide relevant details. If any preference is not mentioned, set it to null.
If the user hasn't specified important details like budget or type, set shouldAskMore to true."#
    )
}

pub fn maintenance_prompt(vehicle: &VehicleRecord) -> String {
    format!(
        r#"You are an automotive maintenance expert. Analyze this car's data and provide maintenance predictions.
RESPOND ONLY WITH A JSON OBJECT (no markdown, no backticks, no additional text).

Car Details:
Make: {make}
Model: {model}
Year: {year}
Mileage: {mileage}
Fuel Type: {fuel_type}

Format your response exactly like this:
{{
  "nextServices": [
    {{
      "serviceName": "string",
      "dueAt": number,
      "estimatedCost": number,
      "priority": "HIGH/MEDIUM/LOW",
      "description": "string"
    }}
  ],
  "partsReplacement": [
    {{
      "partName": "string",
      "recommendedReplacementMileage": number,
      "estimatedCost": number,
      "warning": "string or null"
    }}
  ],
  "totalMaintenanceCost": number,
  "maintenanceSchedule": {{
    "immediate": ["string"],
    "next3Months": ["string"],
    "next6Months": ["string"],
    "next12Months": ["string"]
  }}
}}"#,
        make = vehicle.make,
        model = vehicle.model,
        year = vehicle.year,
        mileage = vehicle.mileage.unwrap_or(0),
        fuel_type = vehicle.fuel_type,
    )
}

pub fn environmental_prompt(vehicle: &VehicleRecord) -> String {
    let mileage = vehicle
        .mileage
        .map(|m| m.to_string())
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        r#"You are an automotive environmental impact expert. Based on this car's data, provide ONLY a JSON object (no other text) with environmental metrics:

Car Details:
Make: {make}
Model: {model}
Year: {year}
Fuel Type: {fuel_type}
Mileage: {mileage}
Transmission: {transmission}

Return ONLY this JSON structure with no additional text or formatting:
{{
  "carbonFootprint": {{
    "annualCO2Emissions": number,
    "lifetimeCO2Emissions": number,
    "comparisonToAverage": number
  }},
  "greenScore": {{
    "score": number,
    "maxScore": 100,
    "factors": [
      {{
        "name": string,
        "score": number,
        "impact": "HIGH" | "MEDIUM" | "LOW"
      }}
    ]
  }},
  "environmentalMetrics": {{
    "fuelEfficiency": number,
    "emissionsCategory": string,
    "renewableCompatibility": number
  }}
}}"#,
        make = vehicle.make,
        model = vehicle.model,
        year = vehicle.year,
        fuel_type = vehicle.fuel_type,
        transmission = vehicle.transmission.as_deref().unwrap_or("N/A"),
    )
}

pub fn price_analysis_prompt(
    vehicle: &VehicleRecord,
    similar: &[PricePoint],
    average_price: f64,
    depreciation_rate: f64,
) -> String {
    let market_data = json!({
        "car": {
            "make": vehicle.make,
            "model": vehicle.model,
            "year": vehicle.year,
            "price": vehicle.price,
            "mileage": vehicle.mileage,
            "fuelType": vehicle.fuel_type,
            "bodyType": vehicle.body_type,
        },
        "similarCars": similar,
        "averageDepreciation": depreciation_rate,
    });

    format!(
        r#"As a car market expert, analyze this vehicle's pricing data:
Car: {year} {make} {model}
Current Price: ${price}
Similar Cars Average: ${average_price}
Market Data: {market_data}

Provide analysis in this JSON format (no markdown):
{{
  "marketValue": {{
    "estimatedValue": number,
    "confidence": number,
    "priceRange": {{
      "low": number,
      "high": number
    }}
  }},
  "priceAnalysis": {{
    "isPriceCompetitive": boolean,
    "valueRating": "EXCELLENT" | "GOOD" | "FAIR" | "HIGH",
    "factors": string[]
  }},
  "buyingRecommendation": {{
    "recommendation": "BUY_NOW" | "WAIT" | "NEGOTIATE",
    "reasoning": string[],
    "potentialSavings": number
  }},
  "seasonalTrends": {{
    "bestMonthToBuy": string,
    "priceVariation": number,
    "seasonalFactors": string[]
  }}
}}"#,
        year = vehicle.year,
        make = vehicle.make,
        model = vehicle.model,
        price = vehicle.price,
    )
}

pub fn comparison_prompt(vehicles: &[VehicleRecord]) -> String {
    let serialized: Vec<_> = vehicles
        .iter()
        .map(|v| {
            json!({
                "id": v.id,
                "make": v.make,
                "model": v.model,
                "year": v.year,
                "price": v.price,
                "mileage": v.mileage,
                "fuelType": v.fuel_type,
                "transmission": v.transmission,
                "bodyType": v.body_type,
                "seats": v.seats,
                "description": v.description,
                "color": v.color,
            })
        })
        .collect();

    let unique: serde_json::Map<String, serde_json::Value> = vehicles
        .iter()
        .map(|v| {
            (
                v.id.to_string(),
                json!([format!("specific unique features for the {}", v.display_name())]),
            )
        })
        .collect();
    let value_analysis: serde_json::Map<String, serde_json::Value> = vehicles
        .iter()
        .map(|v| {
            (
                v.id.to_string(),
                json!({
                    "strengths": ["detailed strengths"],
                    "weaknesses": ["detailed weaknesses"],
                    "valueScore": 85
                }),
            )
        })
        .collect();
    let format = json!({
        "featureComparison": {
            "common": ["list specific features common to all cars, be detailed"],
            "unique": unique
        },
        "valueAnalysis": value_analysis,
        "recommendation": {
            "bestValue": "car model name",
            "bestPerformance": "car model name",
            "bestEfficiency": "car model name",
            "reasoning": ["detailed reasons"]
        }
    });
    let format = serde_json::to_string_pretty(&format).unwrap_or_default();
    let vehicles = serde_json::Value::Array(serialized);

    format!(
        r#"As an automotive expert, analyze these vehicles and provide a detailed comparison:
{vehicles}

Create a detailed comparison focusing on:
1. Common features shared by all vehicles
2. Unique features for each vehicle
3. Value analysis considering price, features, and specifications
4. Overall recommendations

Return ONLY a JSON object in this exact format (no markdown or additional text):
{format}"#
    )
}
